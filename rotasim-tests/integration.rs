//! Integration tests for rotasim
//!
//! These tests drive the engine through its public API only: environments
//! are built, handed to a simulation and stepped or run to completion.
//! They cover aura lifecycles, queue ordering, phase transitions, combat
//! routing, reproducibility and the reference mechanics working together.

#[path = "style.rs"]
mod style;

#[path = "integration/aura_lifecycle.rs"]
mod aura_lifecycle;
#[path = "integration/encounter_routing.rs"]
mod encounter_routing;
#[path = "integration/mechanics_rotation.rs"]
mod mechanics_rotation;
#[path = "integration/phase_transitions.rs"]
mod phase_transitions;
#[path = "integration/queue_ordering.rs"]
mod queue_ordering;
#[path = "integration/reproducibility.rs"]
mod reproducibility;

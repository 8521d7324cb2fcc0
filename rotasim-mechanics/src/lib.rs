//! Rotasim Mechanics - Reference combat mechanics on the rotasim engine.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! The engine knows nothing about damage formulas or resources. This crate
//! shows how mechanics plug into it: automatic swings through the lazy
//! weapon schedule, energy regeneration as a lazy task, periodic damage as
//! pending actions owned by an aura, diseases tracked per target, and
//! combo-point strikes built on stacking auras.
//!
//! Every mechanic registers itself on an [`rotasim_core::Environment`]
//! before the simulation is created and re-arms itself at each pull.

pub mod auto_attack;
pub mod disease;
pub mod dot;
pub mod energy;
pub mod strike;

pub use auto_attack::{AutoAttack, AutoAttackConfig};
pub use disease::{Disease, DiseaseState};
pub use dot::{Dot, DotConfig};
pub use energy::{EnergyBar, EnergyConfig};
pub use strike::{ComboStrike, StrikeKind, StrikeOutcome, register_combo_points};

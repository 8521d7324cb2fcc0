//! Rotasim Core - Discrete-event engine for combat rotation simulation.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! An encounter is simulated many times over. Each iteration walks a
//! virtual clock through a queue of pending actions, expires auras lazily
//! as time passes, crosses encounter phases and ends on a time or damage
//! threshold. All damage and resource formulas live outside the engine;
//! they plug in through aura hooks, pending actions, weapon attacks and
//! tasks.
//!
//! # Features
//!
//! - **Deterministic Execution**: Same seed always produces identical results
//! - **Aura Lifecycle**: Activation, refresh, stacks, lazy expiry and
//!   per-event observer lists with O(1) membership changes
//! - **Mutual Exclusion**: Priority-ranked exclusive categories per unit
//! - **Encounter Phases**: Time or health driven phase ladder with observers
//! - **Metrics**: Per-unit dps/hps distributions and per-aura uptime
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use rotasim_core::{
//!     AuraConfig, EncounterConfig, Environment, SimOptions, SimTime, Simulation, UnitKind,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60)))?;
//! let player = env.add_unit("player", UnitKind::Player);
//! let haste = env.register_aura(player, AuraConfig::new("Haste", SimTime::from_secs(10)))?;
//! env.add_pull_effect(player, move |sim, _| sim.activate_aura(haste))?;
//!
//! let mut sim = Simulation::new(env, SimOptions::deterministic_testing())?;
//! let report = sim.run()?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod aura;
pub mod combat;
pub mod config;
pub mod environment;
pub mod error;
pub mod lazy;
pub mod metrics;
pub mod phase;
pub mod queue;
pub mod report;
pub mod rng;
pub mod simulation;
pub mod time;
pub mod tracing_setup;
pub mod unit;

// Re-export main types for convenient access
pub use aura::{AuraArray, AuraConfig, AuraEvent, AuraId, AuraState};
pub use combat::{ActionId, HitOutcome, SpellId, SpellResult};
pub use config::{EncounterConfig, RotasimConfig, SimOptions};
pub use environment::Environment;
pub use error::{SimError, SimResult};
pub use lazy::{Task, WeaponAttack};
pub use metrics::{IterationMetrics, MetricsSink};
pub use phase::{PhaseLadder, PhaseThreshold};
pub use queue::{ActionHandle, ActionPriority, PendingAction};
pub use report::{AbortSignal, ProgressMetrics, SimulationReport};
pub use simulation::Simulation;
pub use time::SimTime;
pub use unit::{UnitId, UnitKind};

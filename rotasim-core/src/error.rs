//! Error types for the simulation engine.

use thiserror::Error;

use crate::time::SimTime;

/// Errors that abort a simulation run.
///
/// Every variant is a structural violation: a programming error in the
/// configured environment or in a mechanic plugged into it. Soft outcomes
/// such as a blocked exclusive effect or a resource shortfall are never
/// reported through this type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Two auras on the same unit share a label
    #[error("Aura with label {label:?} already registered on unit {unit}")]
    DuplicateAura {
        /// Label of the owning unit
        unit: String,
        /// Conflicting aura label
        label: String,
    },

    /// Aura registered without a label
    #[error("Aura registered with an empty label on unit {unit}")]
    EmptyAuraLabel {
        /// Label of the owning unit
        unit: String,
    },

    /// Registration attempted after the environment was finalized
    #[error("Cannot register aura {label:?}: environment already finalized")]
    EnvironmentFinalized {
        /// Label of the rejected aura
        label: String,
    },

    /// Unit exceeded the sanity cap on registered auras
    #[error("Unit {unit} has too many auras ({count}) while registering {label:?}")]
    TooManyAuras {
        /// Label of the owning unit
        unit: String,
        /// Number of auras already registered
        count: usize,
        /// Label of the rejected aura
        label: String,
    },

    /// Aura configured with a zero duration
    #[error("Aura {label:?} has zero duration")]
    ZeroDuration {
        /// Aura label
        label: String,
    },

    /// Stack count below zero requested
    #[error("Aura {label:?} cannot have negative stacks ({stacks})")]
    NegativeStacks {
        /// Aura label
        label: String,
        /// Requested count
        stacks: i32,
    },

    /// Stack count assigned to an aura declared without a stack cap
    #[error("Aura {label:?} does not support stacks")]
    StacksNotSupported {
        /// Aura label
        label: String,
    },

    /// Non-zero stack count assigned while inactive
    #[error("Cannot set {stacks} stacks on inactive aura {label:?}")]
    StacksOnInactiveAura {
        /// Aura label
        label: String,
        /// Requested count
        stacks: i32,
    },

    /// Aura still active or stacked at an iteration boundary
    #[error("Aura {label:?} on unit {unit} leaked across iteration boundary ({stacks} stacks)")]
    AuraLeaked {
        /// Label of the owning unit
        unit: String,
        /// Aura label
        label: String,
        /// Stack count at the boundary
        stacks: i32,
    },

    /// Pending action due before the current simulation time
    #[error("Cannot schedule action at {at}: current time is {now}")]
    ScheduledInPast {
        /// Requested due time
        at: SimTime,
        /// Current simulation time
        now: SimTime,
    },

    /// Phase ladder violates ordering rules
    #[error("Invalid phase ladder: {reason}")]
    InvalidPhaseLadder {
        /// Which rule was violated
        reason: String,
    },

    /// Unit index outside the environment
    #[error("Unknown unit index {index}")]
    UnknownUnit {
        /// Offending index
        index: usize,
    },

    /// Aura index outside the owning unit's tracker
    #[error("Unknown aura index {index} on unit {unit}")]
    UnknownAura {
        /// Owning unit index
        unit: usize,
        /// Offending aura index
        index: u32,
    },

    /// Configuration rejected during validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Which setting was rejected
        reason: String,
    },

    /// Run aborted between iterations by an external signal
    #[error("Simulation aborted after {completed_iterations} iterations")]
    Aborted {
        /// Iterations finished before the abort was observed
        completed_iterations: u32,
    },
}

/// Result alias used throughout the engine.
pub type SimResult<T> = Result<T, SimError>;

//! Combat participants.

use std::fmt;
use std::rc::Rc;

use crate::aura::AuraTracker;
use crate::error::SimResult;
use crate::metrics::UnitMetrics;
use crate::simulation::Simulation;

/// Stable index of a unit within its environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub usize);

impl UnitId {
    /// Position in the environment's unit list.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit{}", self.0)
    }
}

/// Side a unit fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Player-controlled character
    Player,
    /// Companion of a player
    Pet,
    /// Encounter target; damage it takes counts toward the encounter
    Enemy,
}

/// Work run for a unit when the pull starts at time zero.
pub type PullEffect = Rc<dyn Fn(&mut Simulation, UnitId) -> SimResult<()>>;

/// One participant: its auras, metrics and pull-time behaviour.
pub struct Unit {
    id: UnitId,
    label: String,
    kind: UnitKind,
    enabled: bool,
    pub(crate) auras: AuraTracker,
    pub(crate) metrics: UnitMetrics,
    pub(crate) pull_effects: Vec<PullEffect>,
}

impl Unit {
    pub(crate) fn new(id: UnitId, label: String, kind: UnitKind) -> Self {
        Self {
            id,
            label,
            kind,
            enabled: true,
            auras: AuraTracker::new(id),
            metrics: UnitMetrics::default(),
            pull_effects: Vec::new(),
        }
    }

    /// Index in the environment.
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Side.
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Disabled units take no part in reset, pull or metrics.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Registered auras.
    pub fn auras(&self) -> &AuraTracker {
        &self.auras
    }

    /// Damage and healing metrics.
    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("auras", &self.auras.len())
            .finish()
    }
}

//! Identifiers and outcome records routed through aura dispatch.
//!
//! The engine computes no damage itself. External formula code produces a
//! `SpellResult` and hands it to the simulation, which records metrics and
//! notifies interested auras.

use std::fmt;

use crate::unit::UnitId;

/// Identifies an ability or effect for hooks and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Spell reference passed to cast hooks.
pub type SpellId = ActionId;

/// How an attack landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitOutcome {
    /// Normal hit
    Hit,
    /// Critical hit
    Crit,
    /// Missed entirely
    Miss,
    /// Avoided by the target
    Dodge,
}

impl HitOutcome {
    /// True for outcomes that deal their amount.
    pub fn landed(self) -> bool {
        matches!(self, HitOutcome::Hit | HitOutcome::Crit)
    }
}

/// Outcome of one damage or healing event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpellResult {
    /// Ability that produced the result
    pub spell: SpellId,
    /// Unit that produced the result
    pub caster: UnitId,
    /// Unit receiving the result
    pub target: UnitId,
    /// How the event landed
    pub outcome: HitOutcome,
    /// Damage or healing amount
    pub amount: f64,
}

impl SpellResult {
    /// Creates a landed hit.
    pub fn hit(spell: SpellId, caster: UnitId, target: UnitId, amount: f64) -> Self {
        Self {
            spell,
            caster,
            target,
            outcome: HitOutcome::Hit,
            amount,
        }
    }

    /// Sets the outcome.
    pub fn with_outcome(mut self, outcome: HitOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Amount actually applied given the outcome.
    pub fn applied_amount(&self) -> f64 {
        if self.outcome.landed() { self.amount } else { 0.0 }
    }
}

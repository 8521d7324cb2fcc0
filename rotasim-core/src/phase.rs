//! Encounter phase ladder.
//!
//! The encounter walks down a fixed ladder of phases. Each step is crossed
//! either when cumulative damage taken reaches a fraction of the target's
//! health, or when elapsed time reaches a proportion of the fight length,
//! depending on how the encounter ends.

use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::simulation::Simulation;
use crate::time::SimTime;

/// Observer invoked on every phase transition with the new phase.
pub type PhaseCallback = Rc<dyn Fn(&mut Simulation, i32) -> SimResult<()>>;

/// One rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThreshold {
    /// Phase entered when this rung is crossed
    pub phase: i32,
    /// Remaining health fraction at which the rung is crossed
    pub health_fraction: f64,
    /// Share of the fight spent at or below this rung
    pub time_proportion: f64,
}

impl PhaseThreshold {
    /// Rung using the same fraction for health and time.
    pub const fn uniform(phase: i32, fraction: f64) -> Self {
        Self {
            phase,
            health_fraction: fraction,
            time_proportion: fraction,
        }
    }
}

/// Ordered list of phases an encounter descends through.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseLadder {
    initial_phase: i32,
    thresholds: Vec<PhaseThreshold>,
}

impl Default for PhaseLadder {
    fn default() -> Self {
        Self {
            initial_phase: 100,
            thresholds: vec![
                PhaseThreshold::uniform(90, 0.90),
                PhaseThreshold::uniform(45, 0.45),
                PhaseThreshold::uniform(35, 0.35),
                PhaseThreshold::uniform(25, 0.25),
                PhaseThreshold::uniform(20, 0.20),
            ],
        }
    }
}

impl PhaseLadder {
    /// Builds a validated ladder.
    ///
    /// # Errors
    /// - `SimError::InvalidPhaseLadder` - Phases not strictly descending, or
    ///   fractions outside `[0, 1]` or increasing
    pub fn new(initial_phase: i32, thresholds: Vec<PhaseThreshold>) -> SimResult<Self> {
        let ladder = Self {
            initial_phase,
            thresholds,
        };
        ladder.validate()?;
        Ok(ladder)
    }

    /// Phase before any rung is crossed.
    pub fn initial_phase(&self) -> i32 {
        self.initial_phase
    }

    /// Rungs in crossing order.
    pub fn thresholds(&self) -> &[PhaseThreshold] {
        &self.thresholds
    }

    /// Checks ordering rules.
    ///
    /// # Errors
    /// - `SimError::InvalidPhaseLadder` - A rule is violated
    pub fn validate(&self) -> SimResult<()> {
        let mut phase = self.initial_phase;
        let mut health = 1.0;
        let mut time = 1.0;
        for threshold in &self.thresholds {
            if threshold.phase >= phase {
                return Err(SimError::InvalidPhaseLadder {
                    reason: format!("phase {} does not descend from {}", threshold.phase, phase),
                });
            }
            for (name, value, previous) in [
                ("health fraction", threshold.health_fraction, health),
                ("time proportion", threshold.time_proportion, time),
            ] {
                if !(0.0..=1.0).contains(&value) || value > previous {
                    return Err(SimError::InvalidPhaseLadder {
                        reason: format!("{name} {value} for phase {} out of order", threshold.phase),
                    });
                }
            }
            phase = threshold.phase;
            health = threshold.health_fraction;
            time = threshold.time_proportion;
        }
        Ok(())
    }
}

/// What drives phase transitions in the current iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseMeasure {
    /// Elapsed time against the iteration's fight length
    Elapsed {
        /// Fight length of the iteration
        duration: SimTime,
    },
    /// Cumulative damage taken against the health at which the fight ends
    Damage {
        /// Total damage that ends the fight
        end_at_health: f64,
    },
}

/// Tracks the current phase and the next crossing point.
pub struct PhaseController {
    ladder: PhaseLadder,
    measure: PhaseMeasure,
    phase: i32,
    next_rung: usize,
    next_time: SimTime,
    next_damage: f64,
    callbacks: Vec<PhaseCallback>,
}

impl PhaseController {
    /// Creates a controller parked at the ladder's initial phase.
    pub fn new(ladder: PhaseLadder) -> Self {
        let phase = ladder.initial_phase;
        Self {
            ladder,
            measure: PhaseMeasure::Elapsed {
                duration: SimTime::NEVER,
            },
            phase,
            next_rung: 0,
            next_time: SimTime::NEVER,
            next_damage: f64::INFINITY,
            callbacks: Vec::new(),
        }
    }

    /// Returns to the initial phase for a new iteration and drops observers.
    pub fn reset(&mut self, measure: PhaseMeasure) {
        self.measure = measure;
        self.phase = self.ladder.initial_phase;
        self.next_rung = 0;
        self.callbacks.clear();
        self.compute_next();
    }

    /// Current phase.
    pub fn phase(&self) -> i32 {
        self.phase
    }

    /// True once the encounter is at or below `phase`.
    pub fn is_at_or_below(&self, phase: i32) -> bool {
        self.phase <= phase
    }

    /// Time at which the next rung is crossed, `NEVER` when damage driven.
    pub fn next_time(&self) -> SimTime {
        self.next_time
    }

    /// Damage at which the next rung is crossed, infinite when time driven.
    pub fn next_damage(&self) -> f64 {
        self.next_damage
    }

    /// True when the next rung has been reached.
    pub fn is_due(&self, now: SimTime, damage_taken: f64) -> bool {
        now >= self.next_time || damage_taken >= self.next_damage
    }

    /// Crosses the next rung and returns the phase entered.
    pub(crate) fn descend(&mut self) -> Option<i32> {
        let threshold = *self.ladder.thresholds.get(self.next_rung)?;
        self.phase = threshold.phase;
        self.next_rung += 1;
        self.compute_next();
        Some(self.phase)
    }

    /// Registers an observer for the current iteration.
    pub fn register(&mut self, callback: PhaseCallback) {
        self.callbacks.push(callback);
    }

    pub(crate) fn callbacks(&self) -> Vec<PhaseCallback> {
        self.callbacks.clone()
    }

    fn compute_next(&mut self) {
        self.next_time = SimTime::NEVER;
        self.next_damage = f64::INFINITY;
        let Some(threshold) = self.ladder.thresholds.get(self.next_rung) else {
            return;
        };
        match self.measure {
            PhaseMeasure::Damage { end_at_health } => {
                self.next_damage = (1.0 - threshold.health_fraction) * end_at_health;
            }
            PhaseMeasure::Elapsed { duration } => {
                self.next_time = duration.mul_f64(1.0 - threshold.time_proportion);
            }
        }
    }
}

/// Phases of the default ladder, for execute-range checks.
pub mod execute {
    /// First rung below full health
    pub const PHASE_90: i32 = 90;
    /// Below 45%
    pub const PHASE_45: i32 = 45;
    /// Below 35%
    pub const PHASE_35: i32 = 35;
    /// Below 25%
    pub const PHASE_25: i32 = 25;
    /// Below 20%
    pub const PHASE_20: i32 = 20;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_by_time() {
        let mut controller = PhaseController::new(PhaseLadder::default());
        controller.reset(PhaseMeasure::Elapsed {
            duration: SimTime::from_secs(100),
        });
        assert_eq!(controller.phase(), 100);
        assert_eq!(controller.next_time(), SimTime::from_secs(10));
        assert!(!controller.is_due(SimTime::from_secs(9), 0.0));
        assert!(controller.is_due(SimTime::from_secs(10), 0.0));

        assert_eq!(controller.descend(), Some(90));
        assert_eq!(controller.next_time(), SimTime::from_secs(55));
        for expected in [45, 35, 25, 20] {
            assert_eq!(controller.descend(), Some(expected));
        }
        assert!(controller.next_time().is_never());
        assert_eq!(controller.descend(), None);
        assert!(controller.is_at_or_below(execute::PHASE_20));
    }

    #[test]
    fn test_damage_measure() {
        let mut controller = PhaseController::new(PhaseLadder::default());
        controller.reset(PhaseMeasure::Damage {
            end_at_health: 1000.0,
        });
        assert!(controller.next_time().is_never());
        assert!((controller.next_damage() - 100.0).abs() < 1e-9);
        assert!(controller.is_due(SimTime::from_secs(1_000), 100.0));
    }

    #[test]
    fn test_reset_restores_initial_phase() {
        let mut controller = PhaseController::new(PhaseLadder::default());
        controller.reset(PhaseMeasure::Elapsed {
            duration: SimTime::from_secs(10),
        });
        controller.descend();
        controller.register(Rc::new(|_, _| Ok(())));
        controller.reset(PhaseMeasure::Elapsed {
            duration: SimTime::from_secs(10),
        });
        assert_eq!(controller.phase(), 100);
        assert!(controller.callbacks().is_empty());
    }

    #[test]
    fn test_ladder_validation() {
        assert!(PhaseLadder::new(100, vec![PhaseThreshold::uniform(10, 0.1)]).is_ok());
        assert!(matches!(
            PhaseLadder::new(100, vec![PhaseThreshold::uniform(100, 0.9)]),
            Err(SimError::InvalidPhaseLadder { .. })
        ));
        assert!(matches!(
            PhaseLadder::new(
                100,
                vec![PhaseThreshold::uniform(50, 0.5), PhaseThreshold::uniform(40, 0.6)]
            ),
            Err(SimError::InvalidPhaseLadder { .. })
        ));
        assert!(matches!(
            PhaseLadder::new(100, vec![PhaseThreshold::uniform(50, 1.5)]),
            Err(SimError::InvalidPhaseLadder { .. })
        ));
        assert!(PhaseLadder::default().validate().is_ok());
    }
}

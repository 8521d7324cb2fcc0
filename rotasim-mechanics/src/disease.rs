//! Diseases: one dot per target with explicit per-target records.

use std::cell::RefCell;
use std::rc::Rc;

use rotasim_core::{AuraArray, Environment, SimError, SimResult, Simulation, UnitId};

use crate::dot::{Dot, DotConfig};

/// Per-target bookkeeping of a disease within one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiseaseState {
    /// No application has landed on this target yet this iteration
    pub first_application: bool,
    /// The latest application refreshed an already running disease
    pub refreshing: bool,
}

impl DiseaseState {
    const FRESH: DiseaseState = DiseaseState {
        first_application: true,
        refreshing: false,
    };
}

/// A disease spread over several targets.
///
/// The per-target auras live in an [`AuraArray`] and the records are
/// indexed by target [`UnitId`]. Units the disease was not registered on
/// have no dot and a record that never changes.
pub struct Disease {
    label: String,
    auras: AuraArray,
    dots: Vec<Dot>,
    states: Rc<RefCell<Vec<DiseaseState>>>,
}

impl Disease {
    /// Registers one dot per target, labelled after the disease.
    ///
    /// # Errors
    /// - `SimError::InvalidConfiguration` - No targets given
    /// - Registration errors from the environment
    pub fn register(
        env: &mut Environment,
        caster: UnitId,
        targets: &[UnitId],
        config: DotConfig,
    ) -> SimResult<Self> {
        if targets.is_empty() {
            return Err(SimError::InvalidConfiguration {
                reason: format!("disease {:?} has no targets", config.label),
            });
        }

        let mut dots = Vec::with_capacity(targets.len());
        let auras = env.register_aura_array(targets, |env, target| {
            let dot = Dot::register(env, caster, target, config.clone())?;
            let aura = dot.aura();
            dots.push(dot);
            Ok(aura)
        })?;

        let slots = env.units().len();
        let states = Rc::new(RefCell::new(vec![DiseaseState::FRESH; slots]));
        let reset_states = Rc::clone(&states);
        env.add_reset_effect(caster, move |_, _| {
            reset_states.borrow_mut().fill(DiseaseState::FRESH);
            Ok(())
        })?;
        let faded_states = Rc::clone(&states);
        auras.apply_on_expire(env, move |_, aura| {
            if let Some(state) = faded_states.borrow_mut().get_mut(aura.unit.index()) {
                state.refreshing = false;
            }
            Ok(())
        })?;

        Ok(Self {
            label: config.label,
            auras,
            dots,
            states,
        })
    }

    /// Disease label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Disease auras by target.
    pub fn auras(&self) -> &AuraArray {
        &self.auras
    }

    /// Record for `target`.
    pub fn state(&self, target: UnitId) -> DiseaseState {
        self.states
            .borrow()
            .get(target.index())
            .copied()
            .unwrap_or_default()
    }

    /// Dot ticking on `target`, if registered there.
    pub fn dot(&self, target: UnitId) -> Option<&Dot> {
        let aura = self.auras.get(target)?;
        self.dots.iter().find(|dot| dot.aura() == aura)
    }

    /// True while the disease ticks on `target`.
    pub fn is_infected(&self, sim: &Simulation, target: UnitId) -> bool {
        self.auras.is_active_on(sim, target)
    }

    /// Number of targets currently infected.
    pub fn infected_count(&self, sim: &Simulation) -> usize {
        self.auras.count_active(sim)
    }

    /// Infects or re-infects `target` and updates its record.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - The disease was not registered on `target`
    /// - Errors from applying the dot
    pub fn apply(&self, sim: &mut Simulation, target: UnitId) -> SimResult<()> {
        let dot = self.dot(target).ok_or(SimError::UnknownUnit {
            index: target.index(),
        })?;

        let refreshing = dot.is_active(sim);
        if let Some(state) = self.states.borrow_mut().get_mut(target.index()) {
            state.refreshing = refreshing;
            state.first_application = false;
        }
        sim.log(
            target,
            format_args!(
                "{} {}",
                self.label,
                if refreshing { "refreshed" } else { "applied" }
            ),
        );
        dot.apply(sim)
    }

    /// Spreads the disease from `source` to every other registered target
    /// not yet infected.
    ///
    /// # Errors
    /// Errors from applying the dots.
    pub fn spread(&self, sim: &mut Simulation, source: UnitId) -> SimResult<usize> {
        if !self.is_infected(sim, source) {
            return Ok(0);
        }
        let mut spread = 0;
        for aura in self.auras.iter() {
            let target = aura.unit;
            if target != source && !self.is_infected(sim, target) {
                self.apply(sim, target)?;
                spread += 1;
            }
        }
        Ok(spread)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotasim_core::{ActionId, EncounterConfig, SimOptions, SimTime, UnitKind};

    use super::*;

    fn setup() -> (Simulation, Disease, UnitId, UnitId) {
        let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let first = env.add_unit("boss", UnitKind::Enemy);
        let second = env.add_unit("add", UnitKind::Enemy);
        let disease = Disease::register(
            &mut env,
            player,
            &[first, second],
            DotConfig::fixed("Blood Plague", ActionId(20), SimTime::from_secs(3), 5, 50.0),
        )
        .unwrap();
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        sim.reset().unwrap();
        (sim, disease, first, second)
    }

    #[test]
    fn test_records_track_first_application_and_refresh() {
        let (mut sim, disease, boss, _) = setup();
        assert_eq!(disease.state(boss), DiseaseState::FRESH);

        disease.apply(&mut sim, boss).unwrap();
        assert_eq!(
            disease.state(boss),
            DiseaseState {
                first_application: false,
                refreshing: false
            }
        );

        disease.apply(&mut sim, boss).unwrap();
        assert!(disease.state(boss).refreshing);
        assert!(disease.is_infected(&sim, boss));

        disease.dot(boss).unwrap().cancel(&mut sim).unwrap();
        assert!(!disease.state(boss).refreshing);
        assert!(!disease.state(boss).first_application);
        assert!(!disease.auras().any_active(&sim));
    }

    #[test]
    fn test_spread_and_reset() {
        let (mut sim, disease, boss, add) = setup();
        assert_eq!(disease.spread(&mut sim, boss).unwrap(), 0);

        disease.apply(&mut sim, boss).unwrap();
        assert_eq!(disease.spread(&mut sim, boss).unwrap(), 1);
        assert_eq!(disease.infected_count(&sim), 2);
        assert!(!disease.state(add).first_application);

        while !sim.step().unwrap() {}
        sim.cleanup().unwrap();
        sim.reset().unwrap();
        assert_eq!(disease.state(boss), DiseaseState::FRESH);
        assert_eq!(disease.infected_count(&sim), 0);
    }

    #[test]
    fn test_unregistered_target_rejected() {
        let (mut sim, disease, _, _) = setup();
        assert!(matches!(
            disease.apply(&mut sim, UnitId(0)),
            Err(SimError::UnknownUnit { index: 0 })
        ));
    }
}

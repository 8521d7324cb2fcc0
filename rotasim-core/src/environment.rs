//! Units, encounter settings and pre-pull work, assembled before a run.
//!
//! The environment is built up front and finalized when handed to a
//! [`Simulation`]. After that point no aura may be registered.

use std::rc::Rc;

use crate::aura::{
    Aura, AuraArray, AuraConfig, AuraId, ResetEffect, chain_hook, chain_stacks_hook,
};
use crate::config::EncounterConfig;
use crate::error::{SimError, SimResult};
use crate::simulation::Simulation;
use crate::time::SimTime;
use crate::unit::{PullEffect, Unit, UnitId, UnitKind};

/// Work run before the encounter starts.
#[derive(Clone)]
pub struct PrepullAction {
    /// Offset before the pull, zero or negative
    pub do_at: SimTime,
    pub(crate) action: Rc<dyn Fn(&mut Simulation) -> SimResult<()>>,
}

/// Encounter settings plus its per-iteration damage counter.
#[derive(Debug, Clone)]
pub struct Encounter {
    config: EncounterConfig,
    damage_taken: f64,
}

impl Encounter {
    /// Settings the encounter was built from.
    pub fn config(&self) -> &EncounterConfig {
        &self.config
    }

    /// Health at which the fight ends, or `None` for a time-based fight.
    pub fn end_fight_at_health(&self) -> Option<f64> {
        (self.config.end_fight_at_health > 0.0).then_some(self.config.end_fight_at_health)
    }

    /// Cumulative damage taken by enemy units this iteration.
    pub fn damage_taken(&self) -> f64 {
        self.damage_taken
    }

    pub(crate) fn add_damage_taken(&mut self, amount: f64) {
        self.damage_taken += amount;
    }

    pub(crate) fn reset(&mut self) {
        self.damage_taken = 0.0;
    }
}

/// Everything a simulation runs over.
pub struct Environment {
    pub(crate) units: Vec<Unit>,
    pub(crate) encounter: Encounter,
    prepull_actions: Vec<PrepullAction>,
    finalized: bool,
}

impl Environment {
    /// Creates an empty environment for an encounter.
    ///
    /// # Errors
    /// - `SimError::InvalidPhaseLadder` - The configured ladder is malformed
    pub fn new(encounter: EncounterConfig) -> SimResult<Self> {
        encounter.phase_ladder.validate()?;
        Ok(Self {
            units: Vec::new(),
            encounter: Encounter {
                config: encounter,
                damage_taken: 0.0,
            },
            prepull_actions: Vec::new(),
            finalized: false,
        })
    }

    /// Adds a unit and returns its index.
    pub fn add_unit(&mut self, label: impl Into<String>, kind: UnitKind) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(Unit::new(id, label.into(), kind));
        id
    }

    /// Registers an aura on `unit`.
    ///
    /// # Errors
    /// - `SimError::EnvironmentFinalized` - Environment already handed to a simulation
    /// - `SimError::UnknownUnit` - `unit` is not part of this environment
    /// - `SimError::EmptyAuraLabel`, `SimError::DuplicateAura`,
    ///   `SimError::TooManyAuras`, `SimError::ZeroDuration` - Invalid aura
    pub fn register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        if self.finalized {
            return Err(SimError::EnvironmentFinalized {
                label: config.label,
            });
        }
        let unit = self.unit_mut(unit)?;
        let label = unit.label().to_string();
        unit.auras.register(&label, config)
    }

    /// Registers an aura, or returns the existing one with the same label.
    ///
    /// # Errors
    /// Same as [`Environment::register_aura`] when the label is new.
    pub fn get_or_register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        if let Some(existing) = self.unit(unit)?.auras().find(&config.label) {
            return Ok(existing);
        }
        self.register_aura(unit, config)
    }

    /// Builds one aura per target through `make`, indexed by target.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - A target is not part of this environment
    /// - Errors returned by `make`
    pub fn register_aura_array(
        &mut self,
        targets: &[UnitId],
        mut make: impl FnMut(&mut Environment, UnitId) -> SimResult<AuraId>,
    ) -> SimResult<AuraArray> {
        let mut array = AuraArray::with_slots(self.units.len());
        for &target in targets {
            self.unit(target)?;
            let aura = make(self, target)?;
            array.set(target, aura);
        }
        Ok(array)
    }

    /// Builds one aura per enemy unit, disabled ones included.
    ///
    /// # Errors
    /// Errors returned by `make`.
    pub fn register_enemy_aura_array(
        &mut self,
        make: impl FnMut(&mut Environment, UnitId) -> SimResult<AuraId>,
    ) -> SimResult<AuraArray> {
        let enemies: Vec<UnitId> = self
            .units
            .iter()
            .filter(|unit| unit.kind() == UnitKind::Enemy)
            .map(Unit::id)
            .collect();
        self.register_aura_array(&enemies, make)
    }

    /// Chains a gain hook onto an already registered aura.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - No such aura
    pub fn apply_on_gain(
        &mut self,
        aura: AuraId,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let hooks = &mut self.aura_mut(aura)?.hooks;
        hooks.on_gain = Some(chain_hook(hooks.on_gain.take(), Rc::new(hook)));
        Ok(())
    }

    /// Chains an expire hook onto an already registered aura.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - No such aura
    pub fn apply_on_expire(
        &mut self,
        aura: AuraId,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let hooks = &mut self.aura_mut(aura)?.hooks;
        hooks.on_expire = Some(chain_hook(hooks.on_expire.take(), Rc::new(hook)));
        Ok(())
    }

    /// Chains a stacks hook onto an already registered aura.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - No such aura
    pub fn apply_on_stacks_change(
        &mut self,
        aura: AuraId,
        hook: impl Fn(&mut Simulation, AuraId, i32, i32) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let hooks = &mut self.aura_mut(aura)?.hooks;
        hooks.on_stacks_change = Some(chain_stacks_hook(
            hooks.on_stacks_change.take(),
            Rc::new(hook),
        ));
        Ok(())
    }

    /// Chains a reset hook onto an already registered aura.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - No such aura
    pub fn apply_on_reset(
        &mut self,
        aura: AuraId,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let hooks = &mut self.aura_mut(aura)?.hooks;
        hooks.on_reset = Some(chain_hook(hooks.on_reset.take(), Rc::new(hook)));
        Ok(())
    }

    /// Makes `dependent` follow `parent`: gained with it, faded with it and,
    /// when `dependent` stacks, holding the same stack count.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - Either aura is unknown
    pub fn attach_dependent_aura(&mut self, parent: AuraId, dependent: AuraId) -> SimResult<()> {
        let mirrors_stacks = self.aura_mut(dependent)?.max_stacks > 0;

        self.apply_on_gain(parent, move |sim, _| sim.activate_aura(dependent))?;
        self.apply_on_expire(parent, move |sim, _| sim.deactivate_aura(dependent))?;
        if mirrors_stacks {
            self.apply_on_stacks_change(parent, move |sim, _, _, new| {
                if sim.aura(dependent)?.is_active() {
                    sim.set_stacks(dependent, new)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Adds work run at every iteration reset of `unit`.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - `unit` is not part of this environment
    pub fn add_reset_effect(
        &mut self,
        unit: UnitId,
        effect: impl Fn(&mut Simulation, UnitId) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let effect: ResetEffect = Rc::new(effect);
        self.unit_mut(unit)?.auras.add_reset_effect(effect);
        Ok(())
    }

    /// Adds work run for `unit` when the pull starts.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - `unit` is not part of this environment
    pub fn add_pull_effect(
        &mut self,
        unit: UnitId,
        effect: impl Fn(&mut Simulation, UnitId) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let effect: PullEffect = Rc::new(effect);
        self.unit_mut(unit)?.pull_effects.push(effect);
        Ok(())
    }

    /// Schedules work before the pull.
    ///
    /// # Errors
    /// - `SimError::InvalidConfiguration` - `do_at` is after the pull
    pub fn add_prepull_action(
        &mut self,
        do_at: SimTime,
        action: impl Fn(&mut Simulation) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        if do_at > SimTime::ZERO {
            return Err(SimError::InvalidConfiguration {
                reason: format!("pre-pull action at {do_at} is after the pull"),
            });
        }
        self.prepull_actions.push(PrepullAction {
            do_at,
            action: Rc::new(action),
        });
        Ok(())
    }

    /// Enables or disables a unit.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - `unit` is not part of this environment
    pub fn set_unit_enabled(&mut self, unit: UnitId, enabled: bool) -> SimResult<()> {
        self.unit_mut(unit)?.set_enabled(enabled);
        Ok(())
    }

    /// Unit by index.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - `unit` is not part of this environment
    pub fn unit(&self, unit: UnitId) -> SimResult<&Unit> {
        self.units
            .get(unit.0)
            .ok_or(SimError::UnknownUnit { index: unit.0 })
    }

    pub(crate) fn unit_mut(&mut self, unit: UnitId) -> SimResult<&mut Unit> {
        self.units
            .get_mut(unit.0)
            .ok_or(SimError::UnknownUnit { index: unit.0 })
    }

    /// All units in index order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Encounter settings and state.
    pub fn encounter(&self) -> &Encounter {
        &self.encounter
    }

    /// Pre-pull actions, earliest first once finalized.
    pub fn prepull_actions(&self) -> &[PrepullAction] {
        &self.prepull_actions
    }

    /// True once handed to a simulation.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.prepull_actions.sort_by_key(|action| action.do_at);
        self.finalized = true;
    }

    fn aura_mut(&mut self, id: AuraId) -> SimResult<&mut Aura> {
        self.unit_mut(id.unit)?
            .auras
            .get_mut(id.index)
            .ok_or(SimError::UnknownAura {
                unit: id.unit.0,
                index: id.index,
            })
    }

    pub(crate) fn enabled_units(&self) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|unit| unit.is_enabled())
            .map(Unit::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_blocks_registration() {
        let mut env = Environment::new(EncounterConfig::default()).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        env.register_aura(player, AuraConfig::new("buff", SimTime::from_secs(5)))
            .unwrap();
        env.finalize();
        assert!(matches!(
            env.register_aura(player, AuraConfig::new("late", SimTime::from_secs(5))),
            Err(SimError::EnvironmentFinalized { .. })
        ));
    }

    #[test]
    fn test_get_or_register_returns_existing() {
        let mut env = Environment::new(EncounterConfig::default()).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let first = env
            .get_or_register_aura(player, AuraConfig::new("buff", SimTime::from_secs(5)))
            .unwrap();
        let second = env
            .get_or_register_aura(player, AuraConfig::new("buff", SimTime::from_secs(9)))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prepull_sorted_and_bounded() {
        let mut env = Environment::new(EncounterConfig::default()).unwrap();
        env.add_prepull_action(SimTime::from_secs(-1), |_| Ok(())).unwrap();
        env.add_prepull_action(SimTime::from_secs(-3), |_| Ok(())).unwrap();
        assert!(matches!(
            env.add_prepull_action(SimTime::from_secs(1), |_| Ok(())),
            Err(SimError::InvalidConfiguration { .. })
        ));
        env.finalize();
        let times: Vec<SimTime> = env.prepull_actions().iter().map(|a| a.do_at).collect();
        assert_eq!(times, vec![SimTime::from_secs(-3), SimTime::from_secs(-1)]);
    }

    #[test]
    fn test_aura_array_over_chosen_targets() {
        let mut env = Environment::new(EncounterConfig::default()).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let boss = env.add_unit("boss", UnitKind::Enemy);
        let add = env.add_unit("add", UnitKind::Enemy);

        let mut made = Vec::new();
        let marks = env
            .register_aura_array(&[add], |env, target| {
                made.push(target);
                env.register_aura(target, AuraConfig::permanent("Hunter's Mark"))
            })
            .unwrap();
        assert_eq!(made, vec![add]);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks.get(boss), None);
        assert_eq!(marks.get(add), env.unit(add).unwrap().auras().find("Hunter's Mark"));

        assert!(matches!(
            env.register_aura_array(&[player, UnitId(7)], |env, target| {
                env.register_aura(target, AuraConfig::permanent("Blessing"))
            }),
            Err(SimError::UnknownUnit { index: 7 })
        ));
    }

    #[test]
    fn test_unknown_unit() {
        let mut env = Environment::new(EncounterConfig::default()).unwrap();
        assert!(matches!(
            env.register_aura(UnitId(3), AuraConfig::permanent("x")),
            Err(SimError::UnknownUnit { index: 3 })
        ));
    }
}

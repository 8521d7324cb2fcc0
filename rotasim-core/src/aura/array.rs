//! One aura per target unit, indexed by [`UnitId`].

use std::rc::Rc;

use super::AuraId;
use crate::environment::Environment;
use crate::error::SimResult;
use crate::simulation::Simulation;
use crate::unit::UnitId;

/// Auras a caster keeps on several targets, one slot per environment unit.
///
/// Built through [`Environment::register_aura_array`] or
/// [`Environment::register_enemy_aura_array`]. Slots of units the array was
/// not built over stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuraArray {
    slots: Vec<Option<AuraId>>,
}

impl AuraArray {
    pub(crate) fn with_slots(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub(crate) fn set(&mut self, target: UnitId, aura: AuraId) {
        if let Some(slot) = self.slots.get_mut(target.index()) {
            *slot = Some(aura);
        }
    }

    /// Aura kept on `target`.
    pub fn get(&self, target: UnitId) -> Option<AuraId> {
        self.slots.get(target.index()).copied().flatten()
    }

    /// Number of targets carrying an aura.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// True when no target carries an aura.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Auras in target index order.
    pub fn iter(&self) -> impl Iterator<Item = AuraId> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// True while the aura on `target` is active.
    pub fn is_active_on(&self, sim: &Simulation, target: UnitId) -> bool {
        self.get(target)
            .is_some_and(|id| sim.aura(id).is_ok_and(|aura| aura.is_active()))
    }

    /// True when the aura is active on any target.
    pub fn any_active(&self, sim: &Simulation) -> bool {
        self.count_active(sim) > 0
    }

    /// Number of targets the aura is active on.
    pub fn count_active(&self, sim: &Simulation) -> usize {
        self.iter()
            .filter(|id| sim.aura(*id).is_ok_and(|aura| aura.is_active()))
            .count()
    }

    /// Activates the aura on every enabled target.
    ///
    /// # Errors
    /// Errors raised by gain hooks.
    pub fn activate_all(&self, sim: &mut Simulation) -> SimResult<()> {
        for id in self.iter() {
            if sim.unit(id.unit)?.is_enabled() {
                sim.activate_aura(id)?;
            }
        }
        Ok(())
    }

    /// Deactivates the aura on every target.
    ///
    /// # Errors
    /// Errors raised by stacks or expire hooks.
    pub fn deactivate_all(&self, sim: &mut Simulation) -> SimResult<()> {
        for id in self.iter() {
            sim.deactivate_aura(id)?;
        }
        Ok(())
    }

    /// Chains `hook` onto the expire hook of every aura in the array.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - The array does
    ///   not belong to `env`
    pub fn apply_on_expire(
        &self,
        env: &mut Environment,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let hook = Rc::new(hook);
        for id in self.iter() {
            let hook = Rc::clone(&hook);
            env.apply_on_expire(id, move |sim, aura| hook(sim, aura))?;
        }
        Ok(())
    }
}

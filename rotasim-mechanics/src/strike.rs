//! Combo-point builders and finishers.
//!
//! Builders cost energy and add stacks to a capped combo aura on the
//! caster. Finishers consume every stack through `set_stacks(0)`, which
//! also fades the aura.

use std::rc::Rc;

use rotasim_core::{
    ActionId, AuraConfig, AuraId, Environment, SimResult, SimTime, Simulation, SpellResult,
    UnitId,
};

use crate::energy::EnergyBar;

/// Stack cap of the combo aura.
pub const MAX_COMBO_POINTS: i32 = 5;

/// Label of the combo aura.
pub const COMBO_POINTS_LABEL: &str = "Combo Points";

/// What a strike does with combo points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrikeKind {
    /// Deals rolled damage and adds `points` stacks
    Builder {
        /// Stacks added per cast
        points: i32,
        /// Lowest damage
        min_damage: f64,
        /// Highest damage
        max_damage: f64,
    },
    /// Consumes every stack for damage scaled by the count
    Finisher {
        /// Damage per consumed stack
        damage_per_point: f64,
    },
}

/// Outcome of a cast attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOutcome {
    /// The strike went off
    Cast,
    /// Not enough energy; nothing was spent
    NotEnoughEnergy,
    /// A finisher with no stacks to consume
    NoComboPoints,
}

/// Registers the combo aura shared by a unit's strikes.
///
/// # Errors
/// Registration errors from the environment.
pub fn register_combo_points(env: &mut Environment, unit: UnitId) -> SimResult<AuraId> {
    env.get_or_register_aura(
        unit,
        AuraConfig::new(COMBO_POINTS_LABEL, SimTime::from_secs(20))
            .with_max_stacks(MAX_COMBO_POINTS),
    )
}

/// One ability spending energy and building or consuming combo points.
#[derive(Clone)]
pub struct ComboStrike {
    spell: ActionId,
    caster: UnitId,
    target: UnitId,
    cost: f64,
    kind: StrikeKind,
    combo: AuraId,
    energy: Rc<EnergyBar>,
}

impl ComboStrike {
    /// Creates a strike using `combo` as its combo aura.
    pub fn new(
        spell: ActionId,
        caster: UnitId,
        target: UnitId,
        cost: f64,
        kind: StrikeKind,
        combo: AuraId,
        energy: Rc<EnergyBar>,
    ) -> Self {
        Self {
            spell,
            caster,
            target,
            cost,
            kind,
            combo,
            energy,
        }
    }

    /// Energy cost.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Builder or finisher.
    pub fn kind(&self) -> StrikeKind {
        self.kind
    }

    /// Current combo points of the caster.
    ///
    /// # Errors
    /// - `SimError::UnknownAura` - The combo aura is not registered
    pub fn combo_points(&self, sim: &Simulation) -> SimResult<i32> {
        Ok(sim.aura(self.combo)?.stacks())
    }

    /// Attempts the strike at the current time.
    ///
    /// # Errors
    /// Errors raised by observers of the cast or the damage.
    pub fn cast(&self, sim: &mut Simulation) -> SimResult<StrikeOutcome> {
        let points = self.combo_points(sim)?;
        if matches!(self.kind, StrikeKind::Finisher { .. }) && points == 0 {
            return Ok(StrikeOutcome::NoComboPoints);
        }
        if !self.energy.spend(self.cost) {
            return Ok(StrikeOutcome::NotEnoughEnergy);
        }

        sim.fire_apply_effects(self.caster, self.target, self.spell)?;
        match self.kind {
            StrikeKind::Builder {
                points: gained,
                min_damage,
                max_damage,
            } => {
                let damage = sim.roll(min_damage, max_damage);
                sim.deal_damage(&SpellResult::hit(self.spell, self.caster, self.target, damage))?;
                sim.activate_aura(self.combo)?;
                sim.add_stacks(self.combo, gained)?;
            }
            StrikeKind::Finisher { damage_per_point } => {
                let damage = damage_per_point * f64::from(points);
                sim.deal_damage(&SpellResult::hit(self.spell, self.caster, self.target, damage))?;
                sim.set_stacks(self.combo, 0)?;
            }
        }
        sim.fire_cast_complete(self.caster, self.target, self.spell)?;
        Ok(StrikeOutcome::Cast)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotasim_core::{EncounterConfig, SimOptions, UnitKind};

    use super::*;
    use crate::energy::EnergyConfig;

    struct Rig {
        sim: Simulation,
        builder: ComboStrike,
        finisher: ComboStrike,
    }

    fn rig() -> Rig {
        let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60))).unwrap();
        let rogue = env.add_unit("rogue", UnitKind::Player);
        let boss = env.add_unit("boss", UnitKind::Enemy);
        let energy = EnergyBar::register(&mut env, rogue, EnergyConfig::default()).unwrap();
        let combo = register_combo_points(&mut env, rogue).unwrap();

        let builder = ComboStrike::new(
            ActionId(30),
            rogue,
            boss,
            40.0,
            StrikeKind::Builder {
                points: 2,
                min_damage: 100.0,
                max_damage: 100.0,
            },
            combo,
            Rc::clone(&energy),
        );
        let finisher = ComboStrike::new(
            ActionId(31),
            rogue,
            boss,
            25.0,
            StrikeKind::Finisher {
                damage_per_point: 150.0,
            },
            combo,
            energy,
        );

        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        sim.reset().unwrap();
        sim.prepull().unwrap();
        assert!(!sim.step().unwrap());
        Rig {
            sim,
            builder,
            finisher,
        }
    }

    #[test]
    fn test_builder_adds_points_until_energy_runs_out() {
        let Rig {
            mut sim, builder, ..
        } = rig();

        assert_eq!(builder.cast(&mut sim).unwrap(), StrikeOutcome::Cast);
        assert_eq!(builder.cast(&mut sim).unwrap(), StrikeOutcome::Cast);
        assert_eq!(builder.combo_points(&sim).unwrap(), 4);
        assert_eq!(
            builder.cast(&mut sim).unwrap(),
            StrikeOutcome::NotEnoughEnergy
        );
        assert_eq!(builder.combo_points(&sim).unwrap(), 4);
        assert_eq!(sim.encounter().damage_taken(), 200.0);
    }

    #[test]
    fn test_finisher_consumes_points_and_fades_aura() {
        let Rig {
            mut sim,
            builder,
            finisher,
        } = rig();

        assert_eq!(
            finisher.cast(&mut sim).unwrap(),
            StrikeOutcome::NoComboPoints
        );
        builder.cast(&mut sim).unwrap();
        let combo = sim.find_aura(UnitId(0), COMBO_POINTS_LABEL).unwrap();
        assert_eq!(sim.aura(combo).unwrap().stacks(), 2);

        assert_eq!(finisher.cast(&mut sim).unwrap(), StrikeOutcome::Cast);
        assert_eq!(sim.encounter().damage_taken(), 400.0);
        assert!(!sim.aura(combo).unwrap().is_active());
        assert_eq!(finisher.combo_points(&sim).unwrap(), 0);
    }
}

//! Reference rotation driven by the CLI.
//!
//! A rogue-style player swings automatically, spends energy on combo
//! builders and finishers every global cooldown, keeps a bleed on the boss
//! and, with more than one enemy, spreads a plague across them.

use std::rc::Rc;

use rotasim_core::phase::execute;
use rotasim_core::{
    ActionId, ActionPriority, EncounterConfig, Environment, SimResult, SimTime, Simulation,
    UnitId, UnitKind,
};
use rotasim_mechanics::{
    AutoAttack, AutoAttackConfig, ComboStrike, Disease, Dot, DotConfig, EnergyBar, EnergyConfig,
    StrikeKind, StrikeOutcome, register_combo_points,
};
use tracing::debug;

const GLOBAL_COOLDOWN: SimTime = SimTime::from_secs(1);
const RUPTURE_COST: f64 = 25.0;
const FINISH_AT_POINTS: i32 = 5;
const EXECUTE_FINISH_AT_POINTS: i32 = 3;

/// Label of the player unit.
pub const PLAYER_LABEL: &str = "player";

struct Rotation {
    player: UnitId,
    boss: UnitId,
    energy: Rc<EnergyBar>,
    builder: ComboStrike,
    finisher: ComboStrike,
    rupture: Dot,
    plague: Option<Disease>,
}

impl Rotation {
    fn start(rotation: &Rc<Rotation>, sim: &mut Simulation) -> SimResult<()> {
        let now = sim.current_time();
        Self::queue_at(rotation, sim, now)
    }

    fn queue_at(rotation: &Rc<Rotation>, sim: &mut Simulation, at: SimTime) -> SimResult<()> {
        let next = Rc::clone(rotation);
        sim.schedule(at, ActionPriority::GCD, move |sim| Self::act(&next, sim))?;
        Ok(())
    }

    fn act(rotation: &Rc<Rotation>, sim: &mut Simulation) -> SimResult<()> {
        rotation.choose(sim)?;
        let next = sim.current_time() + GLOBAL_COOLDOWN;
        Self::queue_at(rotation, sim, next)
    }

    fn choose(&self, sim: &mut Simulation) -> SimResult<()> {
        if let Some(plague) = &self.plague {
            if !plague.is_infected(sim, self.boss) {
                return plague.apply(sim, self.boss);
            }
            if plague.spread(sim, self.boss)? > 0 {
                return Ok(());
            }
        }

        if !self.rupture.is_active(sim) && self.energy.spend(RUPTURE_COST) {
            return self.rupture.apply(sim);
        }

        let finish_at = if sim.is_execute_phase(execute::PHASE_20) {
            EXECUTE_FINISH_AT_POINTS
        } else {
            FINISH_AT_POINTS
        };
        let strike = if self.finisher.combo_points(sim)? >= finish_at {
            &self.finisher
        } else {
            &self.builder
        };
        if strike.cast(sim)? == StrikeOutcome::NotEnoughEnergy {
            debug!(unit = %self.player, time = %sim.current_time(), "Pooling energy");
        }
        Ok(())
    }
}

/// Builds the reference environment with `enemies` targets.
///
/// # Errors
/// Registration errors from the environment.
pub fn build_environment(encounter: EncounterConfig, enemies: usize) -> SimResult<Environment> {
    let mut env = Environment::new(encounter)?;
    let player = env.add_unit(PLAYER_LABEL, UnitKind::Player);
    let targets: Vec<UnitId> = (0..enemies.max(1))
        .map(|i| match i {
            0 => env.add_unit("boss", UnitKind::Enemy),
            _ => env.add_unit(format!("add {i}"), UnitKind::Enemy),
        })
        .collect();
    let boss = targets[0];

    AutoAttack::register(&mut env, player, boss, AutoAttackConfig::default())?;
    let energy = EnergyBar::register(&mut env, player, EnergyConfig::default())?;
    let combo = register_combo_points(&mut env, player)?;

    let builder = ComboStrike::new(
        ActionId(2),
        player,
        boss,
        40.0,
        StrikeKind::Builder {
            points: 1,
            min_damage: 200.0,
            max_damage: 260.0,
        },
        combo,
        Rc::clone(&energy),
    );
    let finisher = ComboStrike::new(
        ActionId(3),
        player,
        boss,
        35.0,
        StrikeKind::Finisher {
            damage_per_point: 220.0,
        },
        combo,
        Rc::clone(&energy),
    );
    let rupture = Dot::register(
        &mut env,
        player,
        boss,
        DotConfig {
            label: "Rupture".to_string(),
            spell: ActionId(4),
            tick_length: SimTime::from_secs(2),
            num_ticks: 8,
            min_tick_damage: 90.0,
            max_tick_damage: 110.0,
        },
    )?;
    let plague = if targets.len() > 1 {
        Some(Disease::register(
            &mut env,
            player,
            &targets,
            DotConfig::fixed("Plague", ActionId(5), SimTime::from_secs(3), 7, 60.0),
        )?)
    } else {
        None
    };

    env.add_reset_effect(player, |sim, unit| {
        sim.register_phase_callback(move |sim, phase| {
            sim.log(unit, format_args!("Encounter entered phase {phase}"));
            Ok(())
        });
        Ok(())
    })?;

    let rotation = Rc::new(Rotation {
        player,
        boss,
        energy,
        builder,
        finisher,
        rupture,
        plague,
    });
    env.add_pull_effect(player, move |sim, _| Rotation::start(&rotation, sim))?;

    Ok(env)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotasim_core::SimOptions;

    use super::*;

    #[test]
    fn test_rotation_deals_damage() {
        let env = build_environment(EncounterConfig::fixed(Duration::from_secs(60)), 1).unwrap();
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        let report = sim.run().unwrap();

        let player = report.unit(PLAYER_LABEL).unwrap();
        assert!(player.dps.avg > 0.0);
        assert!(player.auras.is_empty());
        assert_eq!(report.units.len(), 2);
    }

    #[test]
    fn test_plague_spreads_to_adds() {
        let env = build_environment(EncounterConfig::fixed(Duration::from_secs(30)), 3).unwrap();
        let mut options = SimOptions::deterministic_testing();
        options.iterations = 1;
        let mut sim = Simulation::new(env, options).unwrap();
        let report = sim.run().unwrap();

        let add = report.unit("add 2").unwrap();
        let plague = add.auras.iter().find(|aura| aura.label == "Plague").unwrap();
        assert!(plague.avg_uptime.avg > 0.0);
    }
}

//! Automatic weapon swings serviced through the lazy weapon schedule.

use std::cell::Cell;
use std::rc::Rc;

use rotasim_core::{
    ActionId, Environment, HitOutcome, SimResult, SimTime, Simulation, SpellResult, UnitId,
    WeaponAttack,
};

/// Random stream for swing damage.
pub const DAMAGE_ROLL_LABEL: &str = "Auto Attack Damage";
/// Random stream for critical strikes.
pub const CRIT_ROLL_LABEL: &str = "Auto Attack Crit";

/// Weapon swing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoAttackConfig {
    /// Spell reported in results
    pub spell: ActionId,
    /// Time between swings
    pub swing_speed: SimTime,
    /// Lowest damage per swing
    pub min_damage: f64,
    /// Highest damage per swing
    pub max_damage: f64,
    /// Chance in `[0, 1]` that a swing crits
    pub crit_chance: f64,
    /// Damage multiplier on a crit
    pub crit_multiplier: f64,
}

impl Default for AutoAttackConfig {
    fn default() -> Self {
        Self {
            spell: ActionId(1),
            swing_speed: SimTime::from_millis(2600),
            min_damage: 300.0,
            max_damage: 450.0,
            crit_chance: 0.25,
            crit_multiplier: 2.0,
        }
    }
}

/// Swing timer for one unit.
///
/// Shared through an `Rc`; the timer and speed sit in cells so hooks fired
/// by a swing may stop, reset or re-time the attack that triggered them.
#[derive(Debug)]
pub struct AutoAttack {
    config: AutoAttackConfig,
    attacker: UnitId,
    target: UnitId,
    swing_speed: Cell<SimTime>,
    swing_at: Cell<SimTime>,
    swings: Cell<u32>,
}

impl AutoAttack {
    /// Creates the attack and starts it at every pull.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - `attacker` is not part of the environment
    pub fn register(
        env: &mut Environment,
        attacker: UnitId,
        target: UnitId,
        config: AutoAttackConfig,
    ) -> SimResult<Rc<AutoAttack>> {
        let attack = Rc::new(AutoAttack {
            config,
            attacker,
            target,
            swing_speed: Cell::new(config.swing_speed),
            swing_at: Cell::new(SimTime::NEVER),
            swings: Cell::new(0),
        });

        let started = Rc::clone(&attack);
        env.add_pull_effect(attacker, move |sim, _| {
            AutoAttack::start(&started, sim);
            Ok(())
        })?;
        Ok(attack)
    }

    /// Subscribes the attack and schedules a swing at the current time.
    ///
    /// Restores the configured swing speed.
    pub fn start(attack: &Rc<AutoAttack>, sim: &mut Simulation) {
        let now = sim.current_time();
        attack.swing_speed.set(attack.config.swing_speed);
        attack.swing_at.set(now);
        attack.swings.set(0);
        let subscriber: Rc<dyn WeaponAttack> = attack.clone();
        sim.add_weapon_attack(subscriber);
        sim.reschedule_weapon_attack(now);
    }

    /// Time of the next swing.
    pub fn swing_at(&self) -> SimTime {
        self.swing_at.get()
    }

    /// Current time between swings.
    pub fn swing_speed(&self) -> SimTime {
        self.swing_speed.get()
    }

    /// Swings landed this iteration.
    pub fn swings(&self) -> u32 {
        self.swings.get()
    }

    /// Changes the swing speed. The swing in progress keeps its timer.
    pub fn set_swing_speed(&self, swing_speed: SimTime) {
        self.swing_speed.set(swing_speed);
    }

    /// Restarts the swing timer so the next swing lands one full swing from now.
    pub fn reset_swing(&self, sim: &mut Simulation) {
        let next = sim.current_time() + self.swing_speed.get();
        self.swing_at.set(next);
        sim.reschedule_weapon_attack(next);
    }

    /// Stops swinging until the next [`AutoAttack::start`].
    pub fn stop(&self) {
        self.swing_at.set(SimTime::NEVER);
    }

    fn swing(&self, sim: &mut Simulation) -> SimResult<()> {
        let mut damage = sim.roll_with_label(
            self.config.min_damage,
            self.config.max_damage,
            DAMAGE_ROLL_LABEL,
        );
        let outcome = if sim.proc(self.config.crit_chance, CRIT_ROLL_LABEL) {
            damage *= self.config.crit_multiplier;
            HitOutcome::Crit
        } else {
            HitOutcome::Hit
        };

        let result = SpellResult::hit(self.config.spell, self.attacker, self.target, damage)
            .with_outcome(outcome);
        self.swings.set(self.swings.get() + 1);
        sim.deal_damage(&result)
    }
}

impl WeaponAttack for AutoAttack {
    fn try_swing(&self, sim: &mut Simulation) -> SimResult<SimTime> {
        let now = sim.current_time();
        if now < self.swing_at.get() {
            return Ok(self.swing_at.get());
        }
        // Set before dealing damage so hit hooks can override it.
        self.swing_at.set(now + self.swing_speed.get());
        self.swing(sim)?;
        Ok(self.swing_at.get())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotasim_core::{AuraConfig, EncounterConfig, SimOptions, UnitKind};

    use super::*;

    const STEADY: AutoAttackConfig = AutoAttackConfig {
        spell: ActionId(1),
        swing_speed: SimTime::from_secs(2),
        min_damage: 100.0,
        max_damage: 100.0,
        crit_chance: 0.0,
        crit_multiplier: 2.0,
    };

    /// Attack plus a permanent player aura whose hit hook receives the attack.
    fn with_hit_hook(
        seconds: u64,
        hook: impl Fn(&Rc<AutoAttack>, &mut Simulation) + 'static,
    ) -> (Simulation, Rc<AutoAttack>) {
        let mut env =
            Environment::new(EncounterConfig::fixed(Duration::from_secs(seconds))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let target = env.add_unit("target", UnitKind::Enemy);
        let attack = AutoAttack::register(&mut env, player, target, STEADY).unwrap();

        let reached = Rc::clone(&attack);
        let watcher = env
            .register_aura(
                player,
                AuraConfig::permanent("Weapon Watch").on_spell_hit_dealt(move |sim, _, _| {
                    hook(&reached, sim);
                    Ok(())
                }),
            )
            .unwrap();
        env.add_pull_effect(player, move |sim, _| sim.activate_aura(watcher))
            .unwrap();

        let sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        (sim, attack)
    }

    fn setup(config: AutoAttackConfig, seconds: u64) -> (Simulation, Rc<AutoAttack>) {
        let mut env =
            Environment::new(EncounterConfig::fixed(Duration::from_secs(seconds))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let target = env.add_unit("target", UnitKind::Enemy);
        let attack = AutoAttack::register(&mut env, player, target, config).unwrap();
        let sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        (sim, attack)
    }

    #[test]
    fn test_swings_on_cadence_until_end() {
        let config = AutoAttackConfig {
            swing_speed: SimTime::from_secs(2),
            min_damage: 100.0,
            max_damage: 100.0,
            crit_chance: 0.0,
            ..Default::default()
        };
        let (mut sim, attack) = setup(config, 10);
        sim.run_once().unwrap();

        // Swings at 0, 2, 4, 6, 8 and 10.
        assert_eq!(attack.swings(), 6);
        let player = &sim.environment().units()[0];
        assert_eq!(player.metrics().dps.avg, 60.0);
    }

    #[test]
    fn test_guaranteed_crit_doubles_damage() {
        let config = AutoAttackConfig {
            swing_speed: SimTime::from_secs(5),
            min_damage: 100.0,
            max_damage: 100.0,
            crit_chance: 1.0,
            ..Default::default()
        };
        let (mut sim, attack) = setup(config, 4);
        sim.run_once().unwrap();

        assert_eq!(attack.swings(), 1);
        let player = &sim.environment().units()[0];
        assert_eq!(player.metrics().dps.avg, 50.0);
    }

    #[test]
    fn test_stop_halts_swings() {
        let (mut sim, attack) = setup(AutoAttackConfig::default(), 30);
        sim.reset().unwrap();
        sim.prepull().unwrap();
        assert!(!sim.step().unwrap());
        assert_eq!(sim.next_weapon_attack_time(), SimTime::ZERO);

        assert!(!sim.step().unwrap());
        assert_eq!(attack.swings(), 1);
        attack.stop();
        while !sim.step().unwrap() {}
        assert_eq!(attack.swings(), 1);
    }

    #[test]
    fn test_hit_hook_stops_its_own_attack() {
        let (mut sim, attack) = with_hit_hook(20, |attack, _| {
            if attack.swings() == 3 {
                attack.stop();
            }
        });
        sim.run_once().unwrap();

        // Swings at 0, 2 and 4, then nothing.
        assert_eq!(attack.swings(), 3);
        assert!(attack.swing_at().is_never());
    }

    #[test]
    fn test_hit_hook_retimes_its_own_attack() {
        let (mut sim, attack) = with_hit_hook(20, |attack, sim| {
            if attack.swings() == 1 {
                attack.set_swing_speed(SimTime::from_secs(5));
                attack.reset_swing(sim);
            }
        });
        sim.run_once().unwrap();

        // Swings at 0, 5, 10, 15 and 20 instead of every 2 seconds.
        assert_eq!(attack.swings(), 5);
        assert_eq!(attack.swing_speed(), SimTime::from_secs(5));

        // The next pull restores the configured speed.
        sim.reset().unwrap();
        sim.prepull().unwrap();
        assert!(!sim.step().unwrap());
        assert_eq!(attack.swing_speed(), SimTime::from_secs(2));
    }
}

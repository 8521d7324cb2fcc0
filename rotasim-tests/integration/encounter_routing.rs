//! Integration tests for combat routing, encounter estimates and the
//! less common aura and schedule operations

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use rotasim_core::{
    ActionId, ActionPriority, AuraConfig, AuraEvent, AuraId, EncounterConfig, Environment,
    HitOutcome, RotasimConfig, SimError, SimOptions, SimResult, SimTime, Simulation, SpellResult,
    Task, UnitId, UnitKind, WeaponAttack,
};

type Events = Rc<RefCell<Vec<String>>>;

fn environment(encounter: EncounterConfig) -> (Environment, UnitId, UnitId) {
    let mut env = Environment::new(encounter).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    let boss = env.add_unit("boss", UnitKind::Enemy);
    (env, player, boss)
}

fn reset(env: Environment) -> Simulation {
    let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    sim.reset().unwrap();
    sim
}

/// Runs `f` at `at` by queueing it and stepping once.
fn at_time(
    sim: &mut Simulation,
    at: SimTime,
    f: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
) {
    sim.schedule(at, ActionPriority::GCD, f).unwrap();
    assert!(!sim.step().unwrap());
    assert_eq!(sim.current_time(), at);
}

fn recorder(
    events: Events,
    name: &'static str,
) -> impl Fn(&mut Simulation, AuraId, &SpellResult) -> SimResult<()> {
    move |_, _, result: &SpellResult| {
        events.borrow_mut().push(format!("{name} {}", result.amount));
        Ok(())
    }
}

#[test]
fn test_healing_reaches_heal_observers_and_metrics() {
    let (mut env, player, _) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let events: Events = Rc::default();
    let config = AuraConfig::permanent("Watch")
        .on_result(AuraEvent::HealDealt, recorder(Rc::clone(&events), "dealt"))
        .on_result(AuraEvent::HealTaken, recorder(Rc::clone(&events), "taken"))
        .on_result(
            AuraEvent::PeriodicHealDealt,
            recorder(Rc::clone(&events), "periodic"),
        );
    let watch = env.register_aura(player, config).unwrap();
    let mut sim = reset(env);
    sim.activate_aura(watch).unwrap();

    sim.deal_healing(&SpellResult::hit(ActionId(7), player, player, 50.0))
        .unwrap();
    sim.deal_periodic_healing(&SpellResult::hit(ActionId(8), player, player, 20.0))
        .unwrap();

    assert_eq!(*events.borrow(), vec!["dealt 50", "taken 50", "periodic 20"]);
    let metrics = sim.unit(player).unwrap().metrics();
    assert_eq!(metrics.iteration_healing(), 70.0);
    assert_eq!(metrics.iteration_damage(), 0.0);
    assert_eq!(sim.encounter().damage_taken(), 0.0);
}

#[test]
fn test_missed_damage_is_routed_but_not_counted() {
    let (mut env, player, boss) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let events: Events = Rc::default();
    let config = AuraConfig::permanent("Parry Watch")
        .on_spell_hit_taken(recorder(Rc::clone(&events), "taken"));
    let watch = env.register_aura(boss, config).unwrap();
    let mut sim = reset(env);
    sim.activate_aura(watch).unwrap();

    let miss =
        SpellResult::hit(ActionId(2), player, boss, 300.0).with_outcome(HitOutcome::Miss);
    sim.deal_damage(&miss).unwrap();
    sim.deal_damage(&SpellResult::hit(ActionId(2), player, boss, 120.0))
        .unwrap();

    assert_eq!(events.borrow().len(), 2);
    assert_eq!(sim.encounter().damage_taken(), 120.0);
    assert_eq!(sim.unit(player).unwrap().metrics().iteration_damage(), 120.0);
}

#[test]
fn test_apply_effects_reach_only_caster_observers() {
    let (mut env, player, boss) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let seen: Rc<RefCell<Vec<(UnitId, ActionId)>>> = Rc::default();
    let mut auras = Vec::new();
    for unit in [player, boss] {
        let seen = Rc::clone(&seen);
        auras.push(
            env.register_aura(
                unit,
                AuraConfig::permanent("Cast Watch").on_apply_effects(move |_, aura, _, spell| {
                    seen.borrow_mut().push((aura.unit, spell));
                    Ok(())
                }),
            )
            .unwrap(),
        );
    }
    let mut sim = reset(env);
    for aura in auras {
        sim.activate_aura(aura).unwrap();
    }

    sim.fire_apply_effects(player, boss, ActionId(3)).unwrap();
    assert_eq!(*seen.borrow(), vec![(player, ActionId(3))]);
}

#[test]
fn test_remaining_duration_for_timed_fight() {
    let (env, _, _) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let mut sim = reset(env);

    at_time(&mut sim, SimTime::from_secs(15), |_| Ok(()));
    assert_eq!(sim.remaining_duration(), SimTime::from_secs(45));
    assert_eq!(sim.remaining_duration_percent(), 0.75);
}

#[test]
fn test_remaining_duration_extrapolates_health_fight() {
    let (env, player, boss) =
        environment(EncounterConfig::health_based(1000.0, Duration::from_secs(100)));
    let mut sim = reset(env);

    at_time(&mut sim, SimTime::from_secs(10), move |sim| {
        sim.deal_damage(&SpellResult::hit(ActionId(1), player, boss, 250.0))
    });
    assert_eq!(sim.remaining_duration(), SimTime::from_secs(30));
    assert_eq!(sim.remaining_duration_percent(), 0.75);
}

#[test]
fn test_expire_all_keeps_permanent_auras() {
    let (mut env, player, _) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let haste = env
        .register_aura(player, AuraConfig::new("Haste", SimTime::from_secs(10)))
        .unwrap();
    let stance = env
        .register_aura(player, AuraConfig::permanent("Stance"))
        .unwrap();
    let mut sim = reset(env);
    sim.activate_aura(haste).unwrap();
    sim.activate_aura(stance).unwrap();

    sim.expire_all_auras(player).unwrap();
    assert!(!sim.aura(haste).unwrap().is_active());
    assert!(sim.aura(stance).unwrap().is_active());
    assert!(sim.auras(player).unwrap().expiring_list().is_empty());
}

#[test]
fn test_duration_changes_and_direct_expiry() {
    let (mut env, player, _) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let shield = env
        .register_aura(player, AuraConfig::new("Shield", SimTime::from_secs(5)))
        .unwrap();
    let mut sim = reset(env);

    sim.set_aura_duration(shield, SimTime::from_secs(10)).unwrap();
    sim.activate_aura(shield).unwrap();
    assert_eq!(sim.aura(shield).unwrap().expires_at(), SimTime::from_secs(10));

    sim.update_expires(shield, SimTime::from_secs(3)).unwrap();
    at_time(&mut sim, SimTime::from_secs(3), |_| Ok(()));
    assert!(!sim.aura(shield).unwrap().is_active());

    assert!(matches!(
        sim.set_aura_duration(shield, SimTime::ZERO),
        Err(SimError::ZeroDuration { .. })
    ));
}

#[test]
fn test_chained_hooks_run_after_configured_ones() {
    let (mut env, player, _) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let events: Events = Rc::default();
    let (expired, stacked) = (Rc::clone(&events), Rc::clone(&events));
    let charges = env
        .register_aura(
            player,
            AuraConfig::permanent("Charges")
                .with_max_stacks(3)
                .on_expire(move |_, _| {
                    expired.borrow_mut().push("expire".to_string());
                    Ok(())
                })
                .on_stacks_change(move |_, _, old, new| {
                    stacked.borrow_mut().push(format!("stacks {old}->{new}"));
                    Ok(())
                }),
        )
        .unwrap();

    let (expired, stacked, reset_seen) =
        (Rc::clone(&events), Rc::clone(&events), Rc::clone(&events));
    env.apply_on_expire(charges, move |_, _| {
        expired.borrow_mut().push("chained expire".to_string());
        Ok(())
    })
    .unwrap();
    env.apply_on_stacks_change(charges, move |_, _, old, new| {
        stacked.borrow_mut().push(format!("chained stacks {old}->{new}"));
        Ok(())
    })
    .unwrap();
    env.apply_on_reset(charges, move |_, _| {
        reset_seen.borrow_mut().push("reset".to_string());
        Ok(())
    })
    .unwrap();

    let mut sim = reset(env);
    sim.activate_aura(charges).unwrap();
    sim.set_stacks(charges, 2).unwrap();
    sim.deactivate_aura(charges).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            "reset",
            "stacks 0->2",
            "chained stacks 0->2",
            "stacks 2->0",
            "chained stacks 2->0",
            "expire",
            "chained expire",
        ]
    );
}

struct Counter {
    count: Rc<Cell<u32>>,
    period: SimTime,
}

impl Counter {
    fn tick(&self, sim: &Simulation) -> SimTime {
        self.count.set(self.count.get() + 1);
        sim.current_time() + self.period
    }
}

impl WeaponAttack for Counter {
    fn try_swing(&self, sim: &mut Simulation) -> SimResult<SimTime> {
        Ok(self.tick(sim))
    }
}

impl Task for Counter {
    fn run_task(&self, sim: &mut Simulation) -> SimResult<SimTime> {
        Ok(self.tick(sim))
    }
}

#[test]
fn test_removed_subscribers_are_not_serviced() {
    let (env, _, _) = environment(EncounterConfig::fixed(Duration::from_secs(60)));
    let mut sim = reset(env);

    let swings = Rc::new(Cell::new(0));
    let ticks = Rc::new(Cell::new(0));
    let attack: Rc<dyn WeaponAttack> = Rc::new(Counter {
        count: Rc::clone(&swings),
        period: SimTime::from_secs(2),
    });
    let task: Rc<dyn Task> = Rc::new(Counter {
        count: Rc::clone(&ticks),
        period: SimTime::from_secs(3),
    });
    sim.add_weapon_attack(Rc::clone(&attack));
    sim.reschedule_weapon_attack(SimTime::ZERO);
    sim.add_task(Rc::clone(&task));
    sim.reschedule_task(SimTime::ZERO);

    // Weapon first, then task, at the shared due time.
    assert!(!sim.step().unwrap());
    assert_eq!((swings.get(), ticks.get()), (1, 0));
    assert!(!sim.step().unwrap());
    assert_eq!((swings.get(), ticks.get()), (1, 1));
    assert_eq!(sim.next_weapon_attack_time(), SimTime::from_secs(2));
    assert_eq!(sim.next_task_time(), SimTime::from_secs(3));

    assert!(sim.remove_weapon_attack(&attack));
    assert!(!sim.remove_weapon_attack(&attack));
    assert!(sim.remove_task(&task));
    while !sim.step().unwrap() {}

    assert_eq!((swings.get(), ticks.get()), (1, 1));
    assert!(sim.next_weapon_attack_time().is_never());
    assert!(sim.next_task_time().is_never());
}

#[test]
fn test_preset_configs_validate() {
    assert!(RotasimConfig::for_benchmark().validate().is_ok());
    assert!(RotasimConfig::for_testing().validate().is_ok());

    let mut broken = RotasimConfig::for_testing();
    broken.encounter.end_fight_at_health = -1.0;
    assert!(matches!(
        broken.validate(),
        Err(SimError::InvalidConfiguration { .. })
    ));
}

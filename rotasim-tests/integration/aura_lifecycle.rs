//! Integration tests for the aura state machine
//!
//! Activation, refresh, lazy expiry, stacks, exclusivity, dependent auras
//! and iteration-boundary checks, driven through the public simulation API.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rotasim_core::{
    ActionId, ActionPriority, AuraConfig, AuraEvent, EncounterConfig, Environment, SimError,
    SimOptions, SimTime, Simulation, UnitId, UnitKind,
};

type Events = Rc<RefCell<Vec<String>>>;

fn environment() -> (Environment, UnitId) {
    let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60))).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    env.add_unit("target", UnitKind::Enemy);
    (env, player)
}

/// Resets, queues the pull and services the encounter start at time zero.
fn started(env: Environment) -> Simulation {
    let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    sim.reset().unwrap();
    sim.prepull().unwrap();
    assert!(!sim.step().unwrap());
    assert_eq!(sim.current_time(), SimTime::ZERO);
    sim
}

fn run_until(sim: &mut Simulation, at: SimTime) {
    sim.schedule(at, ActionPriority::LOW, |_| Ok(())).unwrap();
    while sim.current_time() < at {
        assert!(!sim.step().unwrap());
    }
}

#[test]
fn test_refresh_moves_expiry_without_duplicate_registration() {
    let (mut env, player) = environment();
    let aura = env
        .register_aura(
            player,
            AuraConfig::new("Flurry", SimTime::from_secs(5))
                .on_spell_hit_dealt(|_, _, _| Ok(())),
        )
        .unwrap();
    let mut sim = started(env);

    sim.activate_aura(aura).unwrap();
    let observers = |sim: &Simulation| {
        sim.auras(player)
            .unwrap()
            .dispatch_list(AuraEvent::SpellHitDealt)
            .len()
    };
    assert_eq!(observers(&sim), 1);

    run_until(&mut sim, SimTime::from_secs(3));
    sim.activate_aura(aura).unwrap();
    assert_eq!(sim.aura(aura).unwrap().expires_at(), SimTime::from_secs(8));
    assert_eq!(observers(&sim), 1);
    assert_eq!(sim.auras(player).unwrap().expiring_list().len(), 1);

    run_until(&mut sim, SimTime::from_millis(7900));
    assert!(sim.aura(aura).unwrap().is_active());

    run_until(&mut sim, SimTime::from_secs(8));
    assert!(!sim.aura(aura).unwrap().is_active());
    assert_eq!(observers(&sim), 0);
    assert_eq!(sim.aura(aura).unwrap().stacks(), 0);
}

#[test]
fn test_zero_stacks_fires_change_before_single_expiry() {
    let events: Events = Rc::default();
    let (mut env, player) = environment();
    let on_stacks = Rc::clone(&events);
    let on_expire = Rc::clone(&events);
    let aura = env
        .register_aura(
            player,
            AuraConfig::new("Sunder", SimTime::from_secs(30))
                .with_max_stacks(5)
                .on_stacks_change(move |_, _, old, new| {
                    on_stacks.borrow_mut().push(format!("stacks {old}->{new}"));
                    Ok(())
                })
                .on_expire(move |_, _| {
                    on_expire.borrow_mut().push("expire".to_string());
                    Ok(())
                }),
        )
        .unwrap();
    let mut sim = started(env);

    sim.activate_aura(aura).unwrap();
    sim.set_stacks(aura, 3).unwrap();
    sim.set_stacks(aura, 0).unwrap();

    assert_eq!(
        *events.borrow(),
        vec!["stacks 0->3", "stacks 3->0", "expire"]
    );
    assert!(!sim.aura(aura).unwrap().is_active());

    // Deactivating again is a no-op.
    sim.deactivate_aura(aura).unwrap();
    assert_eq!(events.borrow().len(), 3);
}

#[test]
fn test_stacks_clamp_and_reject_invalid_counts() {
    let (mut env, player) = environment();
    let stacking = env
        .register_aura(
            player,
            AuraConfig::new("Rage", SimTime::from_secs(10)).with_max_stacks(3),
        )
        .unwrap();
    let plain = env
        .register_aura(player, AuraConfig::new("Shield", SimTime::from_secs(10)))
        .unwrap();
    let mut sim = started(env);

    assert!(matches!(
        sim.set_stacks(stacking, 1),
        Err(SimError::StacksOnInactiveAura { stacks: 1, .. })
    ));

    sim.activate_aura(stacking).unwrap();
    sim.add_stacks(stacking, 10).unwrap();
    assert_eq!(sim.aura(stacking).unwrap().stacks(), 3);
    assert!(matches!(
        sim.set_stacks(stacking, -1),
        Err(SimError::NegativeStacks { stacks: -1, .. })
    ));

    sim.activate_aura(plain).unwrap();
    assert!(matches!(
        sim.add_stack(plain),
        Err(SimError::StacksNotSupported { .. })
    ));
}

#[test]
fn test_exclusive_category_admits_equal_or_stronger_members() {
    let (mut env, player) = environment();
    let strong = env
        .register_aura(
            player,
            AuraConfig::new("Greater Armor", SimTime::from_secs(20)).exclusive("armor", 2.0),
        )
        .unwrap();
    let weak = env
        .register_aura(
            player,
            AuraConfig::new("Lesser Armor", SimTime::from_secs(20)).exclusive("armor", 1.0),
        )
        .unwrap();
    let mut sim = started(env);

    sim.activate_aura(strong).unwrap();
    sim.activate_aura(weak).unwrap();
    assert!(!sim.aura(weak).unwrap().is_active());

    sim.deactivate_aura(strong).unwrap();
    sim.activate_aura(weak).unwrap();
    sim.activate_aura(strong).unwrap();
    assert!(sim.aura(weak).unwrap().is_active());
    assert!(sim.aura(strong).unwrap().is_active());

    let registry = sim.auras(player).unwrap().exclusive();
    let armor = registry.find("armor").unwrap();
    assert_eq!(registry.holders(armor).len(), 2);
    assert_eq!(registry.strongest(armor).unwrap().aura, strong.index);

    sim.deactivate_aura(strong).unwrap();
    sim.deactivate_aura(weak).unwrap();
    let registry = sim.auras(player).unwrap().exclusive();
    assert!(registry.holders(armor).is_empty());
}

#[test]
fn test_dependent_aura_follows_parent() {
    let (mut env, player) = environment();
    let parent = env
        .register_aura(
            player,
            AuraConfig::new("Bloodlust", SimTime::from_secs(10)).with_max_stacks(5),
        )
        .unwrap();
    let dependent = env
        .register_aura(
            player,
            AuraConfig::new("Bloodlust Echo", SimTime::from_secs(10)).with_max_stacks(5),
        )
        .unwrap();
    env.attach_dependent_aura(parent, dependent).unwrap();
    let mut sim = started(env);

    sim.activate_aura(parent).unwrap();
    assert!(sim.aura(dependent).unwrap().is_active());

    sim.set_stacks(parent, 4).unwrap();
    assert_eq!(sim.aura(dependent).unwrap().stacks(), 4);

    sim.deactivate_aura(parent).unwrap();
    assert!(!sim.aura(dependent).unwrap().is_active());
    assert_eq!(sim.aura(dependent).unwrap().stacks(), 0);
}

#[test]
fn test_tags_and_chained_hooks() {
    let gains = Rc::new(RefCell::new(0));
    let (mut env, player) = environment();
    let first = env
        .register_aura(
            player,
            AuraConfig::new("Trinket A", SimTime::from_secs(15)).with_tag("trinket"),
        )
        .unwrap();
    env.register_aura(
        player,
        AuraConfig::new("Trinket B", SimTime::from_secs(15)).with_tag("trinket"),
    )
    .unwrap();
    let counted = Rc::clone(&gains);
    env.apply_on_gain(first, move |_, _| {
        *counted.borrow_mut() += 1;
        Ok(())
    })
    .unwrap();
    let mut sim = started(env);

    let tracker = sim.auras(player).unwrap();
    assert_eq!(tracker.with_tag("trinket").len(), 2);
    assert_eq!(tracker.active_with_tag("trinket"), None);

    sim.activate_aura(first).unwrap();
    let tracker = sim.auras(player).unwrap();
    assert_eq!(tracker.count_active_with_tag("trinket"), 1);
    assert_eq!(tracker.active_with_tag("trinket"), Some(first));
    assert!(sim.has_active_aura(player, "Trinket A"));
    assert_eq!(*gains.borrow(), 1);
}

#[test]
fn test_tracked_aura_metrics_across_iterations() {
    let (mut env, player) = environment();
    let proc_aura = env
        .register_aura(
            player,
            AuraConfig::new("Crusader", SimTime::from_secs(15)).with_action_id(ActionId(7)),
        )
        .unwrap();
    env.add_pull_effect(player, move |sim, _| sim.activate_aura(proc_aura))
        .unwrap();

    let mut options = SimOptions::deterministic_testing();
    options.iterations = 3;
    let mut sim = Simulation::new(env, options).unwrap();
    let report = sim.run().unwrap();

    let aura = &report.unit("player").unwrap().auras[0];
    assert_eq!(aura.label, "Crusader");
    assert_eq!(aura.avg_procs.avg, 1.0);
    assert_eq!(aura.avg_uptime.avg, 15.0);
    assert_eq!(aura.avg_uptime.count, 3);
}

#[test]
fn test_aura_left_active_by_done_iteration_hook_is_leaked() {
    let (mut env, player) = environment();
    env.register_aura(
        player,
        AuraConfig::new("Sticky", SimTime::from_secs(5))
            .on_done_iteration(|sim, id| sim.activate_aura(id)),
    )
    .unwrap();

    let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    let result = sim.run();
    assert!(matches!(
        result,
        Err(SimError::AuraLeaked { ref label, .. }) if label == "Sticky"
    ));
}

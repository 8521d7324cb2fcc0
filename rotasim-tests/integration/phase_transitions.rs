//! Integration tests for the encounter phase ladder

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rotasim_core::{
    ActionId, ActionPriority, EncounterConfig, Environment, PhaseLadder, PhaseThreshold,
    SimError, SimOptions, SimTime, Simulation, SpellResult, UnitId, UnitKind,
};

type Transitions = Rc<RefCell<Vec<(SimTime, i32)>>>;

/// Registers a per-iteration phase observer recording every transition.
fn observe_phases(env: &mut Environment, unit: UnitId) -> Transitions {
    let transitions: Transitions = Rc::default();
    let recorded = Rc::clone(&transitions);
    env.add_reset_effect(unit, move |sim, _| {
        let recorded = Rc::clone(&recorded);
        sim.register_phase_callback(move |sim, phase| {
            recorded.borrow_mut().push((sim.current_time(), phase));
            Ok(())
        });
        Ok(())
    })
    .unwrap();
    transitions
}

fn hit(sim: &mut Simulation, caster: UnitId, target: UnitId, amount: f64) {
    sim.deal_damage(&SpellResult::hit(ActionId(1), caster, target, amount))
        .unwrap();
}

#[test]
fn test_damage_jump_crosses_two_rungs_in_one_advance() {
    let ladder = PhaseLadder::new(
        100,
        vec![
            PhaseThreshold::uniform(10, 0.10),
            PhaseThreshold::uniform(5, 0.05),
        ],
    )
    .unwrap();
    let encounter = EncounterConfig {
        phase_ladder: ladder,
        ..EncounterConfig::health_based(1000.0, Duration::from_secs(60))
    };
    let mut env = Environment::new(encounter).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    let boss = env.add_unit("boss", UnitKind::Enemy);
    let transitions = observe_phases(&mut env, player);

    let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    sim.reset().unwrap();
    sim.schedule(SimTime::from_secs(1), ActionPriority::GCD, move |sim| {
        hit(sim, player, boss, 880.0);
        Ok(())
    })
    .unwrap();
    sim.schedule(SimTime::from_secs(2), ActionPriority::GCD, move |sim| {
        hit(sim, player, boss, 120.0);
        Ok(())
    })
    .unwrap();
    sim.schedule(SimTime::from_secs(3), ActionPriority::GCD, |_| Ok(()))
        .unwrap();

    while sim.current_time() < SimTime::from_secs(2) {
        assert!(!sim.step().unwrap());
    }
    assert_eq!(sim.phase(), 100);
    assert!(transitions.borrow().is_empty());

    assert!(!sim.step().unwrap());
    let three = SimTime::from_secs(3);
    assert_eq!(*transitions.borrow(), vec![(three, 10), (three, 5)]);
    assert!(sim.is_execute_phase(5));
    assert!(sim.step().unwrap());
}

#[test]
fn test_time_ladder_descends_monotonically_each_iteration() {
    let encounter = EncounterConfig::fixed(Duration::from_secs(100));
    let mut env = Environment::new(encounter).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    env.add_unit("boss", UnitKind::Enemy);
    let transitions = observe_phases(&mut env, player);

    // A heartbeat every second so the clock walks through the whole fight.
    env.add_pull_effect(player, |sim, _| {
        for second in 1..=100 {
            sim.schedule(SimTime::from_secs(second), ActionPriority::LOW, |_| Ok(()))?;
        }
        Ok(())
    })
    .unwrap();

    let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    for _ in 0..2 {
        transitions.borrow_mut().clear();
        sim.run_once().unwrap();

        let phases: Vec<i32> = transitions.borrow().iter().map(|&(_, phase)| phase).collect();
        assert_eq!(phases, vec![90, 45, 35, 25, 20]);
        let times: Vec<SimTime> = transitions.borrow().iter().map(|&(at, _)| at).collect();
        assert_eq!(times[0], SimTime::from_secs(10));
        assert_eq!(times[4], SimTime::from_secs(80));
    }
}

#[test]
fn test_malformed_ladder_rejected() {
    let ascending = PhaseLadder::new(
        100,
        vec![
            PhaseThreshold::uniform(20, 0.20),
            PhaseThreshold::uniform(30, 0.10),
        ],
    );
    assert!(matches!(ascending, Err(SimError::InvalidPhaseLadder { .. })));

    let out_of_range = PhaseLadder::new(100, vec![PhaseThreshold::uniform(50, 1.5)]);
    assert!(out_of_range.is_err());
}

//! Integration tests for pending-action ordering, cancellation and cleanup

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rotasim_core::{
    ActionPriority, EncounterConfig, Environment, PendingAction, SimError, SimOptions, SimResult,
    SimTime, Simulation, UnitKind,
};

type Trace = Rc<RefCell<Vec<&'static str>>>;

fn simulation(seconds: u64) -> Simulation {
    let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(seconds))).unwrap();
    env.add_unit("player", UnitKind::Player);
    let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    sim.reset().unwrap();
    sim
}

fn record(
    trace: &Trace,
    name: &'static str,
) -> impl FnOnce(&mut Simulation) -> SimResult<()> + use<> {
    let trace = Rc::clone(trace);
    move |_| {
        trace.borrow_mut().push(name);
        Ok(())
    }
}

#[test]
fn test_higher_priority_runs_first_at_equal_time() {
    let trace: Trace = Rc::default();
    let mut sim = simulation(60);
    let at = SimTime::from_secs(10);

    sim.schedule(at, ActionPriority(1), record(&trace, "low"))
        .unwrap();
    sim.schedule(at, ActionPriority(5), record(&trace, "high"))
        .unwrap();
    while !sim.step().unwrap() {}

    assert_eq!(*trace.borrow(), vec!["high", "low"]);
}

#[test]
fn test_equal_time_and_priority_keeps_insertion_order() {
    let trace: Trace = Rc::default();
    let mut sim = simulation(60);
    let at = SimTime::from_secs(4);

    for name in ["first", "second", "third"] {
        sim.schedule(at, ActionPriority::GCD, record(&trace, name))
            .unwrap();
    }
    sim.schedule(SimTime::from_secs(2), ActionPriority::LOW, record(&trace, "earlier"))
        .unwrap();
    while !sim.step().unwrap() {}

    assert_eq!(*trace.borrow(), vec!["earlier", "first", "second", "third"]);
}

#[test]
fn test_cancelled_action_never_runs_and_cleans_up_once() {
    let trace: Trace = Rc::default();
    let mut sim = simulation(60);

    let handle = sim
        .add_pending_action(
            PendingAction::new(SimTime::from_secs(5), record(&trace, "action"))
                .with_cleanup(record(&trace, "cleanup")),
        )
        .unwrap();
    assert!(sim.is_action_pending(handle));
    assert!(sim.cancel_action(handle));
    assert!(!sim.cancel_action(handle));
    assert!(!sim.is_action_pending(handle));

    while !sim.step().unwrap() {}
    sim.cleanup().unwrap();

    assert_eq!(*trace.borrow(), vec!["cleanup"]);
}

#[test]
fn test_action_past_end_of_combat_is_cleaned_up() {
    let trace: Trace = Rc::default();
    let mut sim = simulation(10);

    sim.add_pending_action(
        PendingAction::new(SimTime::from_secs(5), record(&trace, "inside"))
            .with_cleanup(record(&trace, "inside cleanup")),
    )
    .unwrap();
    sim.add_pending_action(
        PendingAction::new(SimTime::from_secs(15), record(&trace, "outside"))
            .with_cleanup(record(&trace, "outside cleanup")),
    )
    .unwrap();
    while !sim.step().unwrap() {}
    sim.cleanup().unwrap();

    assert_eq!(*trace.borrow(), vec!["inside", "outside cleanup"]);
    assert_eq!(sim.current_time(), SimTime::from_secs(10));
    assert_eq!(sim.pending_action_count(), 0);
}

#[test]
fn test_stale_handle_ignored_after_slot_reuse() {
    let trace: Trace = Rc::default();
    let mut sim = simulation(60);

    let stale = sim
        .schedule(SimTime::from_secs(1), ActionPriority::GCD, record(&trace, "old"))
        .unwrap();
    assert!(!sim.step().unwrap());
    sim.schedule(SimTime::from_secs(2), ActionPriority::GCD, record(&trace, "new"))
        .unwrap();

    assert!(sim.action_pool().recycled() >= 1);
    assert!(!sim.cancel_action(stale));
    while !sim.step().unwrap() {}

    assert_eq!(*trace.borrow(), vec!["old", "new"]);
}

#[test]
fn test_scheduling_before_now_rejected() {
    let mut sim = simulation(60);
    sim.schedule(SimTime::from_secs(3), ActionPriority::GCD, |sim| {
        let result = sim.schedule(SimTime::from_secs(1), ActionPriority::GCD, |_| Ok(()));
        assert!(matches!(result, Err(SimError::ScheduledInPast { .. })));
        sim.schedule(sim.current_time(), ActionPriority::GCD, |_| Ok(()))?;
        Ok(())
    })
    .unwrap();

    while !sim.step().unwrap() {}
    assert_eq!(sim.current_time(), SimTime::from_secs(3));
}

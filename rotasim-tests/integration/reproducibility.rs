//! Integration tests for seeded reproducibility
//!
//! The same base seed must reproduce identical results run after run, and
//! labeled streams must isolate call sites from each other's draws.

use std::time::Duration;

use rotasim_core::rng::RandomManager;
use rotasim_core::{
    ActionId, EncounterConfig, Environment, SimOptions, SimTime, Simulation, SimulationReport,
    UnitKind,
};
use rotasim_mechanics::{AutoAttack, AutoAttackConfig, Dot, DotConfig};

fn options(seed: u64, labeled_rands: bool) -> SimOptions {
    SimOptions {
        iterations: 25,
        random_seed: Some(seed),
        labeled_rands,
        ..SimOptions::deterministic_testing()
    }
}

/// Auto attacks plus a rolling dot; `noise` adds unrelated draws at the pull.
fn run(options: SimOptions, noise: bool) -> SimulationReport {
    let encounter = EncounterConfig {
        duration_variation: Duration::from_secs(10),
        ..EncounterConfig::fixed(Duration::from_secs(90))
    };
    let mut env = Environment::new(encounter).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    let boss = env.add_unit("boss", UnitKind::Enemy);

    AutoAttack::register(
        &mut env,
        player,
        boss,
        AutoAttackConfig {
            crit_chance: 0.3,
            ..Default::default()
        },
    )
    .unwrap();
    let dot = Dot::register(
        &mut env,
        player,
        boss,
        DotConfig {
            label: "Ignite".to_string(),
            spell: ActionId(40),
            tick_length: SimTime::from_secs(3),
            num_ticks: 30,
            min_tick_damage: 50.0,
            max_tick_damage: 150.0,
        },
    )
    .unwrap();
    env.add_pull_effect(player, move |sim, _| {
        if noise {
            for _ in 0..5 {
                sim.random_float("Unrelated Proc");
            }
        }
        dot.apply(sim)
    })
    .unwrap();

    Simulation::new(env, options).unwrap().run().unwrap()
}

#[test]
fn test_same_seed_reproduces_results() {
    for labeled in [false, true] {
        let first = run(options(1234, labeled), false);
        let second = run(options(1234, labeled), false);
        assert_eq!(first.seed, 1234);
        assert_eq!(first.units, second.units);
    }
}

#[test]
fn test_different_seed_changes_results() {
    let first = run(options(1, true), false);
    let second = run(options(2, true), false);
    assert_ne!(
        first.unit("player").unwrap().dps,
        second.unit("player").unwrap().dps
    );
}

#[test]
fn test_labeled_streams_isolate_unrelated_draws() {
    let quiet = run(options(77, true), false);
    let noisy = run(options(77, true), true);
    assert_eq!(quiet.units, noisy.units);

    let quiet = run(options(77, false), false);
    let noisy = run(options(77, false), true);
    assert_ne!(quiet.units, noisy.units);
}

#[test]
fn test_reseed_replays_draw_sequence() {
    let labels = ["Damage Roll", "Crit", "Damage Roll", "Proc", "Crit"];
    for labeled in [false, true] {
        let mut rng = RandomManager::new(99, labeled);
        rng.reseed(4);
        let first: Vec<f64> = labels.iter().map(|label| rng.random_float(label)).collect();

        rng.reseed(5);
        let other: Vec<f64> = labels.iter().map(|label| rng.random_float(label)).collect();
        assert_ne!(first, other);

        rng.reseed(4);
        let replay: Vec<f64> = labels.iter().map(|label| rng.random_float(label)).collect();
        assert_eq!(first, replay);
        assert_eq!(rng.current_seed(), 103);
    }
}

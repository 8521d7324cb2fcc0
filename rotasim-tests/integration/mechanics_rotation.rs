//! Integration tests for the reference mechanics running together
//!
//! A small builder/finisher loop on the global cooldown, fed by energy
//! regeneration, alongside auto attacks and a dot. Also covers metrics
//! sinks, disabled units and aborting a run from a progress observer.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rotasim_core::{
    ActionId, ActionPriority, AuraConfig, EncounterConfig, Environment, IterationMetrics,
    MetricsSink, SimError, SimOptions, SimResult, SimTime, Simulation, UnitId, UnitKind,
};
use rotasim_mechanics::{
    AutoAttack, AutoAttackConfig, ComboStrike, Dot, DotConfig, EnergyBar, EnergyConfig,
    StrikeKind, register_combo_points,
};

const BUILDER: ActionId = ActionId(100);
const FINISHER: ActionId = ActionId(101);

type Casts = Rc<RefCell<Vec<ActionId>>>;

struct Loop {
    builder: ComboStrike,
    finisher: ComboStrike,
}

fn queue_gcd(rotation: Rc<Loop>, sim: &mut Simulation, at: SimTime) -> SimResult<()> {
    sim.schedule(at, ActionPriority::GCD, move |sim| {
        let strike = if rotation.finisher.combo_points(sim)? >= 5 {
            &rotation.finisher
        } else {
            &rotation.builder
        };
        strike.cast(sim)?;
        let next = sim.current_time() + SimTime::from_secs(1);
        queue_gcd(Rc::clone(&rotation), sim, next)
    })?;
    Ok(())
}

/// Player, boss and a disabled bystander with the full set of mechanics.
fn environment(seconds: u64) -> (Environment, Casts) {
    let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(seconds))).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    let boss = env.add_unit("boss", UnitKind::Enemy);
    let bystander = env.add_unit("bystander", UnitKind::Enemy);
    env.set_unit_enabled(bystander, false).unwrap();

    AutoAttack::register(&mut env, player, boss, AutoAttackConfig::default()).unwrap();
    let energy = EnergyBar::register(&mut env, player, EnergyConfig::default()).unwrap();
    let combo = register_combo_points(&mut env, player).unwrap();
    let dot = Dot::register(
        &mut env,
        player,
        boss,
        DotConfig::fixed("Garrote", ActionId(102), SimTime::from_secs(3), 6, 80.0),
    )
    .unwrap();

    let casts: Casts = Rc::default();
    let seen = Rc::clone(&casts);
    let counter = env
        .register_aura(
            player,
            AuraConfig::permanent("Cast Counter").on_cast_complete(move |_, _, _, spell| {
                seen.borrow_mut().push(spell);
                Ok(())
            }),
        )
        .unwrap();

    let rotation = Rc::new(Loop {
        builder: ComboStrike::new(
            BUILDER,
            player,
            boss,
            40.0,
            StrikeKind::Builder {
                points: 1,
                min_damage: 150.0,
                max_damage: 200.0,
            },
            combo,
            Rc::clone(&energy),
        ),
        finisher: ComboStrike::new(
            FINISHER,
            player,
            boss,
            25.0,
            StrikeKind::Finisher {
                damage_per_point: 180.0,
            },
            combo,
            energy,
        ),
    });
    env.add_pull_effect(player, move |sim, _| {
        sim.activate_aura(counter)?;
        dot.apply(sim)?;
        queue_gcd(Rc::clone(&rotation), sim, SimTime::ZERO)
    })
    .unwrap();

    (env, casts)
}

#[derive(Default)]
struct RecordingSink {
    seen: Rc<RefCell<Vec<(UnitId, String)>>>,
}

impl MetricsSink for RecordingSink {
    fn done_iteration(&mut self, unit: UnitId, label: &str, metrics: &IterationMetrics) {
        assert_eq!(metrics.duration, SimTime::from_secs(40));
        self.seen.borrow_mut().push((unit, label.to_string()));
    }
}

#[test]
fn test_builders_feed_finishers() {
    let (env, casts) = environment(40);
    let mut options = SimOptions::deterministic_testing();
    options.iterations = 1;
    let mut sim = Simulation::new(env, options).unwrap();
    sim.run().unwrap();

    let casts = casts.borrow();
    let builders = casts.iter().filter(|&&spell| spell == BUILDER).count();
    let finishers = casts.iter().filter(|&&spell| spell == FINISHER).count();
    assert!(finishers >= 1);
    assert!(builders >= 5 * finishers);
    assert_eq!(casts.len(), builders + finishers);
}

#[test]
fn test_sinks_receive_enabled_units_in_order() {
    let (env, _) = environment(40);
    let sink = RecordingSink::default();
    let seen = Rc::clone(&sink.seen);

    let mut options = SimOptions::deterministic_testing();
    options.iterations = 3;
    let mut sim = Simulation::new(env, options).unwrap();
    sim.add_metrics_sink(Box::new(sink));
    let report = sim.run().unwrap();

    let labels: Vec<String> = seen.borrow().iter().map(|(_, label)| label.clone()).collect();
    assert_eq!(
        labels,
        vec!["player", "boss", "player", "boss", "player", "boss"]
    );
    assert!(report.unit("bystander").is_none());

    let boss = report.unit("boss").unwrap();
    let garrote = boss.auras.iter().find(|aura| aura.label == "Garrote").unwrap();
    assert_eq!(garrote.avg_uptime.avg, 18.0);
    assert_eq!(garrote.avg_procs.avg, 1.0);
}

#[test]
fn test_abort_from_progress_observer() {
    let (env, _) = environment(20);
    let mut options = SimOptions::deterministic_testing();
    options.iterations = 50;
    options.progress_interval = Duration::ZERO;
    let mut sim = Simulation::new(env, options).unwrap();

    let abort = sim.abort_signal();
    let reports = Rc::new(RefCell::new(0));
    let counted = Rc::clone(&reports);
    sim.set_progress_reporter(move |progress| {
        *counted.borrow_mut() += 1;
        if progress.completed_iterations >= 3 {
            abort.trigger();
        }
    });

    assert_eq!(
        sim.run(),
        Err(SimError::Aborted {
            completed_iterations: 4
        })
    );
    assert_eq!(*reports.borrow(), 3);
}

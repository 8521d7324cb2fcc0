use std::hint::black_box;
use std::time::Duration;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rotasim_core::{
    ActionId, ActionPriority, AuraConfig, EncounterConfig, Environment, PendingAction, SimOptions,
    SimTime, Simulation, SpellResult, UnitId, UnitKind,
};
use rotasim_core::queue::PendingActionQueue;

fn bench_queue_insertion(c: &mut Criterion) {
    c.bench_function("queue_insert_pop_256", |b| {
        b.iter_batched(
            PendingActionQueue::new,
            |mut queue| {
                for i in 0..256_i64 {
                    let at = SimTime::from_millis((i * 7919) % 1000);
                    let priority = ActionPriority((i % 4) as i32);
                    queue.push(PendingAction::new(at, |_| Ok(())).with_priority(priority));
                }
                while let Some(handle) = queue.pop() {
                    black_box(handle);
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn observer_sim(observers: usize) -> (Simulation, UnitId, UnitId) {
    let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60))).unwrap();
    let player = env.add_unit("player", UnitKind::Player);
    let target = env.add_unit("target", UnitKind::Enemy);
    let mut ids = Vec::new();
    for i in 0..observers {
        let id = env
            .register_aura(
                player,
                AuraConfig::permanent(format!("observer {i}")).on_spell_hit_dealt(|_, _, result| {
                    black_box(result.amount);
                    Ok(())
                }),
            )
            .unwrap();
        ids.push(id);
    }
    env.add_pull_effect(player, move |sim, _| {
        for id in &ids {
            sim.activate_aura(*id)?;
        }
        Ok(())
    })
    .unwrap();
    let sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
    (sim, player, target)
}

fn bench_dispatch_fan_out(c: &mut Criterion) {
    let (mut sim, player, target) = observer_sim(32);
    sim.reset().unwrap();
    sim.prepull().unwrap();
    sim.step().unwrap();

    let hit = SpellResult::hit(ActionId(1), player, target, 100.0);
    c.bench_function("dispatch_spell_hit_32_observers", |b| {
        b.iter(|| sim.deal_damage(black_box(&hit)).unwrap());
    });
}

fn bench_full_iteration(c: &mut Criterion) {
    let (mut sim, player, target) = observer_sim(8);
    c.bench_function("full_iteration_auto_hits", |b| {
        b.iter(|| {
            sim.reset().unwrap();
            sim.prepull().unwrap();
            for i in 1..=60 {
                sim.schedule(SimTime::from_secs(i), ActionPriority::AUTO, move |sim| {
                    sim.deal_damage(&SpellResult::hit(ActionId(1), player, target, 250.0))
                })
                .unwrap();
            }
            while !sim.step().unwrap() {}
            sim.cleanup().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_queue_insertion,
    bench_dispatch_fan_out,
    bench_full_iteration
);
criterion_main!(benches);

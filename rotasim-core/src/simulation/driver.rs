//! Iteration state machine: reset, pre-pull, event loop, cleanup.

use std::time::Instant;

use tracing::{debug, info, trace};

use super::Simulation;
use crate::error::{SimError, SimResult};
use crate::metrics::IterationMetrics;
use crate::phase::PhaseMeasure;
use crate::queue::{ActionHandle, ActionPriority, PendingAction};
use crate::report::{ProgressMetrics, SimulationReport};
use crate::time::SimTime;
use crate::unit::UnitId;

impl Simulation {
    /// Runs every configured iteration and aggregates the results.
    ///
    /// The abort signal is polled between iterations; an iteration in
    /// progress always runs to completion.
    ///
    /// # Errors
    /// - `SimError::Aborted` - The abort signal was triggered
    /// - Any structural error raised during an iteration
    pub fn run(&mut self) -> SimResult<SimulationReport> {
        let total = self.options.iterations;
        info!(
            "Starting simulation: {} iterations, seed {}",
            total,
            self.rng.base_seed()
        );

        let started = Instant::now();
        self.iteration = 0;
        self.reseed(0);
        self.run_once()?;
        let first_iteration_duration = started.elapsed();
        self.log_enabled = self.options.debug;

        let mut last_report = Instant::now();
        for i in 1..total {
            if self.abort.is_triggered() {
                info!("Simulation aborted after {} iterations", i);
                return Err(SimError::Aborted {
                    completed_iterations: i,
                });
            }
            if last_report.elapsed() >= self.options.progress_interval {
                self.report_progress(i);
                last_report = Instant::now();
            }

            self.iteration = i;
            self.reseed(u64::from(i));
            self.run_once()?;
        }

        let elapsed = started.elapsed();
        self.report_progress(total);
        let avg_iteration_duration = elapsed / total;
        info!(
            "Simulation complete: {} iterations in {:?} (avg {:?}/iteration)",
            total, elapsed, avg_iteration_duration
        );

        Ok(SimulationReport::collect(
            self,
            first_iteration_duration,
            avg_iteration_duration,
        ))
    }

    /// Runs one iteration from reset to cleanup.
    ///
    /// # Errors
    /// Any structural error raised during the iteration.
    pub fn run_once(&mut self) -> SimResult<()> {
        self.reset()?;
        self.prepull()?;
        while !self.step()? {}
        self.cleanup()
    }

    /// Reseeds every random stream for `iteration`.
    pub fn reseed(&mut self, iteration: u64) {
        self.rng.reseed(iteration);
    }

    /// Clears per-iteration state and draws this iteration's duration.
    ///
    /// # Errors
    /// - `SimError::AuraLeaked` - An aura survived the previous iteration
    /// - Errors raised by reset effects or hooks
    pub fn reset(&mut self) -> SimResult<()> {
        if self.duration_is_estimate && self.current_time != SimTime::ZERO {
            self.base_duration = self.current_time;
            self.duration_is_estimate = false;
        }

        self.duration = self.base_duration;
        let variation = SimTime::from(self.env.encounter.config().duration_variation);
        if variation != SimTime::ZERO {
            let jitter = (variation + variation).mul_f64(self.rng.random_float("sim duration"));
            self.duration = self.duration + jitter - variation;
        }

        for handle in self.queue.drain() {
            self.queue.dispose(handle);
        }

        let end_at_health = self.env.encounter.end_fight_at_health();
        let measure = match end_at_health {
            Some(health) => PhaseMeasure::Damage {
                end_at_health: health,
            },
            None => PhaseMeasure::Elapsed {
                duration: self.duration,
            },
        };
        self.phases.reset(measure);

        (self.end_of_combat_duration, self.end_of_combat_damage) = match end_at_health {
            Some(health) => (SimTime::NEVER, health),
            None => (self.duration, f64::INFINITY),
        };

        self.current_time = SimTime::ZERO;
        self.aura_trackers.clear();
        self.min_tracker_time = SimTime::NEVER;
        self.weapon_attacks.reset();
        self.tasks.reset();
        self.env.encounter.reset();

        for unit in self.env.enabled_units() {
            self.reset_unit_auras(unit)?;
            self.aura_trackers.push(unit);
        }

        trace!(
            iteration = self.iteration,
            duration = %self.duration,
            "Iteration reset"
        );
        Ok(())
    }

    /// Queues the pre-pull actions and the encounter-start action.
    ///
    /// # Errors
    /// - `SimError::ScheduledInPast` - Never in practice; times are ordered
    pub fn prepull(&mut self) -> SimResult<()> {
        let prepull = self.env.prepull_actions().to_vec();
        let count = prepull.len() as i32;

        if let Some(first) = prepull.first() {
            self.current_time = first.do_at;
        }
        for (i, prepull_action) in prepull.into_iter().enumerate() {
            let action = prepull_action.action;
            self.add_pending_action(
                PendingAction::new(prepull_action.do_at, move |sim| action(sim))
                    .with_priority(ActionPriority::PREPULL.raised(count - i as i32)),
            )?;
        }

        self.add_pending_action(
            PendingAction::new(SimTime::ZERO, |sim| sim.start_encounter())
                .with_priority(ActionPriority::PREPULL.raised(count + 1)),
        )?;
        Ok(())
    }

    fn start_encounter(&mut self) -> SimResult<()> {
        let enabled = self.env.enabled_units();
        for &unit in &enabled {
            self.dispatch_encounter_start(unit)?;
        }
        for unit in enabled {
            for effect in self.env.unit(unit)?.pull_effects.clone() {
                effect(self, unit)?;
            }
        }
        Ok(())
    }

    /// Services the next logical event. Returns `true` once the iteration is over.
    ///
    /// # Errors
    /// Errors raised by the serviced action, attack or task.
    pub fn step(&mut self) -> SimResult<bool> {
        let head_at = self.queue.next_time();
        let weapon_at = self.weapon_attacks.min_time();
        let task_at = self.tasks.min_time();

        if head_at.is_never() && weapon_at.is_never() && task_at.is_never() {
            return Ok(true);
        }

        if head_at >= weapon_at && weapon_at <= task_at {
            if self.combat_over_at(weapon_at) {
                return Ok(true);
            }
            self.advance_weapon_attacks()?;
            return Ok(false);
        }

        if head_at >= task_at {
            if self.combat_over_at(task_at) {
                return Ok(true);
            }
            self.advance_tasks()?;
            return Ok(false);
        }

        let Some(handle) = self.queue.peek() else {
            return Ok(true);
        };

        if self.queue.is_cancelled(handle) {
            self.queue.pop();
            self.queue.mark_consumed(handle);
            return self.clean_up_action(handle).map(|()| false);
        }

        if self.combat_over_at(head_at) {
            return Ok(true);
        }

        self.queue.pop();
        if head_at > self.current_time {
            self.advance(head_at)?;
        }

        // Hooks fired by the advance may have cancelled this action.
        self.queue.mark_consumed(handle);
        if self.queue.is_cancelled(handle) {
            return self.clean_up_action(handle).map(|()| false);
        }

        let action = self.queue.take_action(handle);
        self.queue.dispose(handle);
        if let Some(action) = action {
            action(self)?;
        }
        Ok(false)
    }

    fn combat_over_at(&self, at: SimTime) -> bool {
        at > self.end_of_combat_duration
            || self.env.encounter.damage_taken() > self.end_of_combat_damage
    }

    fn clean_up_action(&mut self, handle: ActionHandle) -> SimResult<()> {
        let clean_up = self.queue.take_clean_up(handle);
        self.queue.dispose(handle);
        match clean_up {
            Some(clean_up) => clean_up(self),
            None => Ok(()),
        }
    }

    /// Moves the clock to `at`, crossing phases and expiring auras on the way.
    ///
    /// # Errors
    /// Errors raised by phase observers or expire hooks.
    pub(crate) fn advance(&mut self, at: SimTime) -> SimResult<()> {
        self.current_time = at;

        // Several rungs may be crossed by one advance when fractions coincide.
        while self
            .phases
            .is_due(self.current_time, self.env.encounter.damage_taken())
        {
            let Some(phase) = self.phases.descend() else {
                break;
            };
            if self.log_enabled {
                debug!(time = %self.current_time, phase, "Entered phase");
            }
            for callback in self.phases.callbacks() {
                callback(self, phase)?;
            }
        }

        if self.current_time >= self.min_tracker_time {
            self.min_tracker_time = SimTime::NEVER;
            for unit in self.aura_trackers.clone() {
                let next = self.advance_unit_auras(unit)?;
                self.min_tracker_time = self.min_tracker_time.min(next);
            }
        }
        Ok(())
    }

    fn advance_weapon_attacks(&mut self) -> SimResult<()> {
        let due = self.weapon_attacks.min_time();
        if due > self.current_time {
            self.advance(due)?;
        }

        self.weapon_attacks.set_min_time(SimTime::NEVER);
        for attack in self.weapon_attacks.snapshot() {
            let next = attack.try_swing(self)?;
            self.weapon_attacks.reschedule(next);
        }
        Ok(())
    }

    fn advance_tasks(&mut self) -> SimResult<()> {
        let due = self.tasks.min_time();
        if due > self.current_time {
            self.advance(due)?;
        }

        self.tasks.set_min_time(SimTime::NEVER);
        for task in self.tasks.snapshot() {
            let next = task.run_task(self)?;
            self.tasks.reschedule(next);
        }
        Ok(())
    }

    /// Ends the iteration: runs outstanding cleanups, tears down auras and
    /// folds metrics.
    ///
    /// # Errors
    /// - `SimError::AuraLeaked` - A hook left an aura active or stacked
    /// - Errors raised by cleanups or hooks
    pub fn cleanup(&mut self) -> SimResult<()> {
        if self.env.encounter.end_fight_at_health().is_some() {
            self.duration = self.current_time;
        } else {
            self.current_time = self.duration;
        }

        for handle in self.queue.drain() {
            self.queue.mark_consumed(handle);
            self.clean_up_action(handle)?;
        }

        let enabled = self.env.enabled_units();
        for &unit in &enabled {
            self.done_iteration_unit_auras(unit)?;
        }

        let duration = self.duration;
        let mut results: Vec<(UnitId, String, IterationMetrics)> = Vec::with_capacity(enabled.len());
        for unit in enabled {
            let unit_ref = self.env.unit_mut(unit)?;
            let metrics = unit_ref.metrics.done_iteration(duration);
            results.push((unit, unit_ref.label().to_string(), metrics));
        }
        for sink in &mut self.metrics_sinks {
            for (unit, label, metrics) in &results {
                sink.done_iteration(*unit, label, metrics);
            }
        }

        trace!(
            iteration = self.iteration,
            duration = %self.duration,
            "Iteration cleanup"
        );
        Ok(())
    }

    fn report_progress(&mut self, completed: u32) {
        let avg_dps: f64 = self
            .env
            .units()
            .iter()
            .filter(|unit| unit.is_enabled())
            .map(|unit| unit.metrics().dps.avg)
            .sum();
        let metrics = ProgressMetrics {
            total_iterations: self.options.iterations,
            completed_iterations: completed,
            avg_dps,
        };
        trace!(
            completed = completed,
            total = metrics.total_iterations,
            "Progress"
        );
        if let Some(reporter) = self.progress.as_mut() {
            reporter(&metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::aura::AuraConfig;
    use crate::config::{EncounterConfig, SimOptions};
    use crate::environment::Environment;
    use crate::phase::{PhaseLadder, PhaseThreshold};
    use crate::unit::UnitKind;

    fn fixed_sim(seconds: u64) -> (Simulation, UnitId) {
        let mut env = Environment::new(EncounterConfig::fixed(StdDuration::from_secs(seconds))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        env.add_unit("target", UnitKind::Enemy);
        let sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        (sim, player)
    }

    #[test]
    fn test_empty_iteration_finishes() {
        let (mut sim, _) = fixed_sim(10);
        sim.run_once().unwrap();
        assert_eq!(sim.current_time(), SimTime::from_secs(10));
        assert!(sim.queue.is_empty());
    }

    #[test]
    fn test_action_after_end_gets_cleanup_only() {
        let (mut sim, _) = fixed_sim(10);
        let log = Rc::new(RefCell::new(Vec::new()));
        sim.reset().unwrap();
        sim.prepull().unwrap();

        let ran = Rc::clone(&log);
        let cleaned = Rc::clone(&log);
        sim.add_pending_action(
            PendingAction::new(SimTime::from_secs(20), move |_| {
                ran.borrow_mut().push("ran");
                Ok(())
            })
            .with_cleanup(move |_| {
                cleaned.borrow_mut().push("cleanup");
                Ok(())
            }),
        )
        .unwrap();

        while !sim.step().unwrap() {}
        sim.cleanup().unwrap();
        assert_eq!(*log.borrow(), vec!["cleanup"]);
    }

    #[test]
    fn test_cancelled_action_cleans_up_once() {
        let (mut sim, _) = fixed_sim(10);
        let count = Rc::new(RefCell::new((0, 0)));
        sim.reset().unwrap();
        sim.prepull().unwrap();

        let ran = Rc::clone(&count);
        let cleaned = Rc::clone(&count);
        let handle = sim
            .add_pending_action(
                PendingAction::new(SimTime::from_secs(2), move |_| {
                    ran.borrow_mut().0 += 1;
                    Ok(())
                })
                .with_cleanup(move |_| {
                    cleaned.borrow_mut().1 += 1;
                    Ok(())
                }),
            )
            .unwrap();
        assert!(sim.cancel_action(handle));
        assert!(!sim.cancel_action(handle));

        while !sim.step().unwrap() {}
        sim.cleanup().unwrap();
        assert_eq!(*count.borrow(), (0, 1));
    }

    #[test]
    fn test_scheduling_in_past_rejected() {
        let (mut sim, _) = fixed_sim(10);
        sim.reset().unwrap();
        sim.advance(SimTime::from_secs(5)).unwrap();
        assert!(matches!(
            sim.schedule(SimTime::from_secs(4), ActionPriority::GCD, |_| Ok(())),
            Err(SimError::ScheduledInPast { .. })
        ));
        assert!(
            sim.schedule(SimTime::from_secs(5), ActionPriority::GCD, |_| Ok(()))
                .is_ok()
        );
    }

    #[test]
    fn test_time_based_phases_fire_in_order() {
        let ladder = PhaseLadder::new(
            100,
            vec![
                PhaseThreshold::uniform(50, 0.5),
                PhaseThreshold::uniform(20, 0.2),
            ],
        )
        .unwrap();
        let mut encounter = EncounterConfig::fixed(StdDuration::from_secs(100));
        encounter.phase_ladder = ladder;
        let mut env = Environment::new(encounter).unwrap();
        env.add_unit("player", UnitKind::Player);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let observer = Rc::clone(&seen);
        env.add_reset_effect(UnitId(0), move |sim, _| {
            let observer = Rc::clone(&observer);
            sim.register_phase_callback(move |sim, phase| {
                observer.borrow_mut().push((phase, sim.current_time()));
                Ok(())
            });
            Ok(())
        })
        .unwrap();
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();

        sim.reset().unwrap();
        sim.prepull().unwrap();
        sim.schedule(SimTime::from_secs(85), ActionPriority::GCD, |_| Ok(()))
            .unwrap();
        while !sim.step().unwrap() {}

        assert_eq!(
            *seen.borrow(),
            vec![(50, SimTime::from_secs(85)), (20, SimTime::from_secs(85))]
        );
        assert_eq!(sim.phase(), 20);
    }

    #[test]
    fn test_aura_expires_lazily_on_advance() {
        let mut env = Environment::new(EncounterConfig::fixed(StdDuration::from_secs(30))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let buff = env
            .register_aura(player, AuraConfig::new("buff", SimTime::from_secs(5)))
            .unwrap();
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();

        sim.reset().unwrap();
        sim.activate_aura(buff).unwrap();
        assert_eq!(sim.min_tracker_time, SimTime::from_secs(5));

        sim.advance(SimTime::from_millis(4999)).unwrap();
        assert!(sim.aura(buff).unwrap().is_active());
        sim.advance(SimTime::from_secs(5)).unwrap();
        assert!(!sim.aura(buff).unwrap().is_active());
        assert_eq!(sim.min_tracker_time, SimTime::NEVER);
    }

    #[test]
    fn test_duration_variation_stays_in_bounds() {
        let encounter = EncounterConfig {
            duration: StdDuration::from_secs(60),
            duration_variation: StdDuration::from_secs(5),
            ..Default::default()
        };
        let mut env = Environment::new(encounter).unwrap();
        env.add_unit("player", UnitKind::Player);
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        for i in 0..20 {
            sim.reseed(i);
            sim.reset().unwrap();
            assert!(sim.duration() >= SimTime::from_secs(55));
            assert!(sim.duration() <= SimTime::from_secs(65));
        }
    }

    #[test]
    fn test_progress_reported_at_completion() {
        let (mut sim, _) = fixed_sim(5);
        let last = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&last);
        sim.set_progress_reporter(move |metrics| {
            *sink.borrow_mut() = Some(metrics.completed_iterations);
        });
        let report = sim.run().unwrap();
        assert_eq!(report.iterations, 10);
        assert_eq!(*last.borrow(), Some(10));
    }

    #[test]
    fn test_abort_between_iterations() {
        let (mut sim, _) = fixed_sim(5);
        let signal = sim.abort_signal();
        signal.trigger();
        assert!(matches!(
            sim.run(),
            Err(SimError::Aborted {
                completed_iterations: 1
            })
        ));
    }

    #[test]
    fn test_first_iteration_only_logging() {
        let (mut sim, _) = fixed_sim(5);
        sim.options.debug_first_iteration = true;
        sim.log_enabled = true;
        sim.run().unwrap();
        assert!(!sim.is_logging());
    }
}

//! Energy regenerated on a fixed tick, serviced as a lazy task.

use std::cell::Cell;
use std::rc::Rc;

use rotasim_core::{Environment, SimResult, SimTime, Simulation, Task, UnitId};
use tracing::trace;

/// Energy pool parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyConfig {
    /// Pool size
    pub max_energy: f64,
    /// Energy at the pull
    pub starting_energy: f64,
    /// Energy gained per tick
    pub energy_per_tick: f64,
    /// Time between ticks
    pub tick_length: SimTime,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            max_energy: 100.0,
            starting_energy: 100.0,
            energy_per_tick: 20.0,
            tick_length: SimTime::from_secs(2),
        }
    }
}

/// Regenerating energy pool of one unit, shared through an `Rc`.
#[derive(Debug)]
pub struct EnergyBar {
    config: EnergyConfig,
    unit: UnitId,
    current: Cell<f64>,
    next_tick: Cell<SimTime>,
    wasted: Cell<f64>,
}

impl EnergyBar {
    /// Creates the pool; it refills and starts ticking at every pull.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - `unit` is not part of the environment
    pub fn register(
        env: &mut Environment,
        unit: UnitId,
        config: EnergyConfig,
    ) -> SimResult<Rc<EnergyBar>> {
        let bar = Rc::new(EnergyBar {
            config,
            unit,
            current: Cell::new(config.starting_energy),
            next_tick: Cell::new(SimTime::NEVER),
            wasted: Cell::new(0.0),
        });

        let started = Rc::clone(&bar);
        env.add_pull_effect(unit, move |sim, _| {
            let config = started.config;
            started
                .current
                .set(config.starting_energy.min(config.max_energy));
            started.wasted.set(0.0);
            let next_tick = sim.current_time() + config.tick_length;
            started.next_tick.set(next_tick);

            let task: Rc<dyn Task> = started.clone();
            sim.add_task(task);
            sim.reschedule_task(next_tick);
            Ok(())
        })?;
        Ok(bar)
    }

    /// Energy available now.
    pub fn current(&self) -> f64 {
        self.current.get()
    }

    /// Regeneration lost to the cap this iteration.
    pub fn wasted(&self) -> f64 {
        self.wasted.get()
    }

    /// Time of the next regeneration tick.
    pub fn next_tick(&self) -> SimTime {
        self.next_tick.get()
    }

    /// Spends `amount`. Returns `false`, spending nothing, when short.
    pub fn spend(&self, amount: f64) -> bool {
        let current = self.current.get();
        if amount > current {
            trace!(unit = %self.unit, amount, current, "Not enough energy");
            return false;
        }
        self.current.set(current - amount);
        true
    }

    /// Adds energy up to the cap.
    pub fn gain(&self, amount: f64) {
        let current = self.current.get();
        let room = self.config.max_energy - current;
        self.wasted.set(self.wasted.get() + (amount - room).max(0.0));
        self.current.set((current + amount).min(self.config.max_energy));
    }

    /// Time until `amount` is available, assuming no spending in between.
    pub fn time_until(&self, amount: f64, now: SimTime) -> SimTime {
        let current = self.current.get();
        if current >= amount {
            return SimTime::ZERO;
        }
        let next_tick = self.next_tick.get();
        if self.config.energy_per_tick <= 0.0 || next_tick.is_never() {
            return SimTime::NEVER;
        }
        let ticks = ((amount - current) / self.config.energy_per_tick).ceil() as i64;
        let after_first = SimTime::from_nanos(self.config.tick_length.as_nanos() * (ticks - 1));
        (next_tick - now) + after_first
    }
}

impl Task for EnergyBar {
    fn run_task(&self, sim: &mut Simulation) -> SimResult<SimTime> {
        let now = sim.current_time();
        while self.next_tick.get() <= now {
            self.gain(self.config.energy_per_tick);
            self.next_tick.set(self.next_tick.get() + self.config.tick_length);
        }
        Ok(self.next_tick.get())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotasim_core::{ActionPriority, EncounterConfig, SimOptions, UnitKind};

    use super::*;

    fn setup(config: EnergyConfig) -> (Simulation, Rc<EnergyBar>) {
        let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(30))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let bar = EnergyBar::register(&mut env, player, config).unwrap();
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        sim.reset().unwrap();
        sim.prepull().unwrap();
        assert!(!sim.step().unwrap());
        (sim, bar)
    }

    #[test]
    fn test_spend_and_shortfall() {
        let (_, bar) = setup(EnergyConfig::default());
        assert!(bar.spend(60.0));
        assert!(!bar.spend(60.0));
        assert_eq!(bar.current(), 40.0);
    }

    #[test]
    fn test_regenerates_on_tick_with_cap() {
        let config = EnergyConfig {
            starting_energy: 50.0,
            ..Default::default()
        };
        let (mut sim, bar) = setup(config);
        assert_eq!(sim.next_task_time(), SimTime::from_secs(2));

        let checked = Rc::clone(&bar);
        sim.schedule(SimTime::from_secs(5), ActionPriority::GCD, move |_| {
            assert_eq!(checked.current(), 90.0);
            Ok(())
        })
        .unwrap();
        sim.schedule(SimTime::from_secs(7), ActionPriority::GCD, |_| Ok(()))
            .unwrap();
        while sim.current_time() < SimTime::from_secs(7) {
            sim.step().unwrap();
        }

        assert_eq!(bar.current(), 100.0);
        assert_eq!(bar.wasted(), 10.0);
        assert_eq!(bar.next_tick(), SimTime::from_secs(8));
    }

    #[test]
    fn test_time_until() {
        let (sim, bar) = setup(EnergyConfig {
            starting_energy: 0.0,
            ..Default::default()
        });
        assert_eq!(bar.time_until(0.0, sim.current_time()), SimTime::ZERO);
        assert_eq!(bar.time_until(20.0, sim.current_time()), SimTime::from_secs(2));
        assert_eq!(bar.time_until(50.0, sim.current_time()), SimTime::from_secs(6));
    }
}

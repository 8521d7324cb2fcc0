//! Per-iteration metrics and their aggregation across iterations.

use crate::time::SimTime;
use crate::unit::UnitId;

/// Running mean, deviation and range of a per-iteration sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistributionMetrics {
    /// Samples recorded
    pub count: u64,
    /// Running mean
    pub avg: f64,
    /// Population standard deviation
    pub stdev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    sum: f64,
    sum_squares: f64,
}

impl DistributionMetrics {
    /// Adds one sample.
    pub fn record(&mut self, sample: f64) {
        if self.count == 0 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
        self.count += 1;
        self.sum += sample;
        self.sum_squares += sample * sample;

        let n = self.count as f64;
        self.avg = self.sum / n;
        self.stdev = (self.sum_squares / n - self.avg * self.avg).max(0.0).sqrt();
    }
}

/// Damage and healing totals for one unit.
#[derive(Debug, Clone, Default)]
pub struct UnitMetrics {
    damage: f64,
    healing: f64,
    /// Damage per second across iterations
    pub dps: DistributionMetrics,
    /// Healing per second across iterations
    pub hps: DistributionMetrics,
}

impl UnitMetrics {
    /// Damage dealt in the current iteration.
    pub fn iteration_damage(&self) -> f64 {
        self.damage
    }

    /// Healing done in the current iteration.
    pub fn iteration_healing(&self) -> f64 {
        self.healing
    }

    pub(crate) fn add_damage(&mut self, amount: f64) {
        self.damage += amount;
    }

    pub(crate) fn add_healing(&mut self, amount: f64) {
        self.healing += amount;
    }

    /// Folds the iteration totals into the distributions and clears them.
    pub(crate) fn done_iteration(&mut self, duration: SimTime) -> IterationMetrics {
        let seconds = duration.as_secs_f64();
        let (dps, hps) = if seconds > 0.0 {
            (self.damage / seconds, self.healing / seconds)
        } else {
            (0.0, 0.0)
        };
        self.dps.record(dps);
        self.hps.record(hps);

        let iteration = IterationMetrics {
            damage: self.damage,
            healing: self.healing,
            dps,
            hps,
            duration,
        };
        self.damage = 0.0;
        self.healing = 0.0;
        iteration
    }
}

/// Snapshot handed to sinks at the end of an iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationMetrics {
    /// Damage dealt during the iteration
    pub damage: f64,
    /// Healing done during the iteration
    pub healing: f64,
    /// Damage per second
    pub dps: f64,
    /// Healing per second
    pub hps: f64,
    /// Length of the iteration
    pub duration: SimTime,
}

/// Proc and uptime accounting for auras that carry an action id.
#[derive(Debug, Clone, Default)]
pub struct AuraMetrics {
    /// Activations, refreshes included, in the current iteration
    pub procs: u64,
    /// Active time in the current iteration
    pub uptime: SimTime,
    /// Activations per iteration
    pub avg_procs: DistributionMetrics,
    /// Uptime seconds per iteration
    pub avg_uptime: DistributionMetrics,
}

impl AuraMetrics {
    pub(crate) fn reset(&mut self) {
        self.procs = 0;
        self.uptime = SimTime::ZERO;
    }

    pub(crate) fn done_iteration(&mut self) {
        self.avg_procs.record(self.procs as f64);
        self.avg_uptime.record(self.uptime.as_secs_f64());
    }
}

/// External consumer of per-unit iteration results.
///
/// Called exactly once per unit per iteration, in unit-index order.
pub trait MetricsSink {
    /// Receives one unit's results.
    fn done_iteration(&mut self, unit: UnitId, label: &str, metrics: &IterationMetrics);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_running_stats() {
        let mut dist = DistributionMetrics::default();
        for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            dist.record(sample);
        }
        assert_eq!(dist.count, 8);
        assert!((dist.avg - 5.0).abs() < 1e-9);
        assert!((dist.stdev - 2.0).abs() < 1e-9);
        assert_eq!(dist.min, 2.0);
        assert_eq!(dist.max, 9.0);
    }

    #[test]
    fn test_unit_metrics_done_iteration_clears_totals() {
        let mut metrics = UnitMetrics::default();
        metrics.add_damage(1000.0);
        metrics.add_healing(50.0);
        let iteration = metrics.done_iteration(SimTime::from_secs(10));
        assert!((iteration.dps - 100.0).abs() < 1e-9);
        assert!((iteration.hps - 5.0).abs() < 1e-9);
        assert_eq!(metrics.iteration_damage(), 0.0);
        assert_eq!(metrics.dps.count, 1);
    }

    #[test]
    fn test_zero_length_iteration_records_zero() {
        let mut metrics = UnitMetrics::default();
        metrics.add_damage(10.0);
        let iteration = metrics.done_iteration(SimTime::ZERO);
        assert_eq!(iteration.dps, 0.0);
    }
}

//! Run results, progress snapshots and the abort signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::metrics::DistributionMetrics;
use crate::simulation::Simulation;

/// Cloneable flag that stops a run before its next iteration.
///
/// The only state shared across threads; everything else in a simulation
/// is owned by the thread running it.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the run to stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once triggered.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Coarse progress snapshot handed to a progress reporter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressMetrics {
    /// Iterations requested
    pub total_iterations: u32,
    /// Iterations finished so far
    pub completed_iterations: u32,
    /// Sum of the enabled units' average dps so far
    pub avg_dps: f64,
}

/// Aggregated results of one aura.
#[derive(Debug, Clone, PartialEq)]
pub struct AuraReport {
    /// Aura label
    pub label: String,
    /// Seconds active per iteration
    pub avg_uptime: DistributionMetrics,
    /// Activations per iteration
    pub avg_procs: DistributionMetrics,
}

/// Aggregated results of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    /// Unit label
    pub label: String,
    /// Damage per second across iterations
    pub dps: DistributionMetrics,
    /// Healing per second across iterations
    pub hps: DistributionMetrics,
    /// Auras carrying an action id
    pub auras: Vec<AuraReport>,
}

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// Base seed the run started from
    pub seed: u64,
    /// Iterations completed
    pub iterations: u32,
    /// Wall-clock time of the first iteration
    pub first_iteration_duration: Duration,
    /// Mean wall-clock time per iteration
    pub avg_iteration_duration: Duration,
    /// Enabled units in index order
    pub units: Vec<UnitReport>,
}

impl SimulationReport {
    pub(crate) fn collect(
        sim: &Simulation,
        first_iteration_duration: Duration,
        avg_iteration_duration: Duration,
    ) -> Self {
        let units = sim
            .environment()
            .units()
            .iter()
            .filter(|unit| unit.is_enabled())
            .map(|unit| UnitReport {
                label: unit.label().to_string(),
                dps: unit.metrics().dps,
                hps: unit.metrics().hps,
                auras: unit
                    .auras()
                    .auras()
                    .iter()
                    .filter(|aura| aura.action_id().is_some())
                    .map(|aura| AuraReport {
                        label: aura.label().to_string(),
                        avg_uptime: aura.metrics().avg_uptime,
                        avg_procs: aura.metrics().avg_procs,
                    })
                    .collect(),
            })
            .collect();

        Self {
            seed: sim.rng().base_seed(),
            iterations: sim.options().iterations,
            first_iteration_duration,
            avg_iteration_duration,
            units,
        }
    }

    /// Results of the unit labelled `label`.
    pub fn unit(&self, label: &str) -> Option<&UnitReport> {
        self.units.iter().find(|unit| unit.label == label)
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str(&format!(
            "Simulation: {} iterations, seed {}\n",
            self.iterations, self.seed
        ));
        summary.push_str(&format!(
            "Timing: first iteration {:?}, average {:?}\n",
            self.first_iteration_duration, self.avg_iteration_duration
        ));

        for unit in &self.units {
            summary.push_str(&format!("\n{}\n", unit.label));
            if unit.dps.avg > 0.0 {
                summary.push_str(&format!(
                    "  DPS: {:.1} (stdev {:.1}, min {:.1}, max {:.1})\n",
                    unit.dps.avg, unit.dps.stdev, unit.dps.min, unit.dps.max
                ));
            }
            if unit.hps.avg > 0.0 {
                summary.push_str(&format!(
                    "  HPS: {:.1} (stdev {:.1})\n",
                    unit.hps.avg, unit.hps.stdev
                ));
            }
            for aura in &unit.auras {
                summary.push_str(&format!(
                    "  {}: {:.1}s uptime, {:.2} procs\n",
                    aura.label, aura.avg_uptime.avg, aura.avg_procs.avg
                ));
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_signal_shared_between_clones() {
        let signal = AbortSignal::new();
        let remote = signal.clone();
        assert!(!signal.is_triggered());

        std::thread::spawn(move || remote.trigger()).join().unwrap();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_summary_lists_units_and_auras() {
        let mut dps = DistributionMetrics::default();
        dps.record(1200.0);
        let mut uptime = DistributionMetrics::default();
        uptime.record(42.0);

        let report = SimulationReport {
            seed: 7,
            iterations: 1,
            first_iteration_duration: Duration::from_millis(3),
            avg_iteration_duration: Duration::from_millis(3),
            units: vec![UnitReport {
                label: "rogue".to_string(),
                dps,
                hps: DistributionMetrics::default(),
                auras: vec![AuraReport {
                    label: "Slice".to_string(),
                    avg_uptime: uptime,
                    avg_procs: DistributionMetrics::default(),
                }],
            }],
        };

        let summary = report.summary();
        assert!(summary.contains("seed 7"));
        assert!(summary.contains("DPS: 1200.0"));
        assert!(summary.contains("Slice: 42.0s uptime"));
        assert!(!summary.contains("HPS"));
        assert!(report.unit("rogue").is_some());
    }
}

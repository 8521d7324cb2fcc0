//! Centralized configuration for rotasim.
//!
//! All tunable run and encounter settings are defined here to avoid
//! hard-coded values scattered through the engine and the CLI.

use std::time::Duration;

use crate::error::{SimError, SimResult};
use crate::phase::PhaseLadder;

/// Top-level configuration for a simulation run.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct RotasimConfig {
    /// Run-level settings
    pub options: SimOptions,
    /// Encounter settings
    pub encounter: EncounterConfig,
}

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Number of iterations to run
    pub iterations: u32,
    /// Base seed; `None` draws a fresh one per run
    pub random_seed: Option<u64>,
    /// Use one random stream per call-site label
    pub labeled_rands: bool,
    /// Emit per-event debug logs for every iteration
    pub debug: bool,
    /// Emit per-event debug logs for the first iteration only
    pub debug_first_iteration: bool,
    /// Minimum wall-clock gap between progress reports
    pub progress_interval: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            iterations: 1000,
            random_seed: None,
            labeled_rands: false,
            debug: false,
            debug_first_iteration: false,
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// Encounter length, end condition and phase layout.
#[derive(Debug, Clone)]
pub struct EncounterConfig {
    /// Nominal fight length
    pub duration: Duration,
    /// Each iteration's length is drawn uniformly within this of `duration`
    pub duration_variation: Duration,
    /// End once enemies have taken this much damage; zero for a time-based fight
    pub end_fight_at_health: f64,
    /// Replace `duration` with the observed length after the first iteration
    pub duration_is_estimate: bool,
    /// Phases the encounter descends through
    pub phase_ladder: PhaseLadder,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(180),
            duration_variation: Duration::from_secs(5),
            end_fight_at_health: 0.0,
            duration_is_estimate: false,
            phase_ladder: PhaseLadder::default(),
        }
    }
}

impl EncounterConfig {
    /// Fixed-length fight without variation.
    pub fn fixed(duration: Duration) -> Self {
        Self {
            duration,
            duration_variation: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Fight that ends once enemies have taken `health` damage.
    pub fn health_based(health: f64, estimated_duration: Duration) -> Self {
        Self {
            duration: estimated_duration,
            duration_variation: Duration::ZERO,
            end_fight_at_health: health,
            duration_is_estimate: true,
            ..Default::default()
        }
    }
}

impl SimOptions {
    /// Small, reproducible runs for tests.
    pub fn deterministic_testing() -> Self {
        Self {
            iterations: 10,
            random_seed: Some(42), // Fixed seed for reproducible tests
            labeled_rands: true,
            ..Default::default()
        }
    }
}

impl RotasimConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(iterations) = std::env::var("ROTASIM_ITERATIONS")
            && let Ok(count) = iterations.parse::<u32>()
        {
            config.options.iterations = count;
        }

        if let Ok(seed) = std::env::var("ROTASIM_SEED")
            && let Ok(seed_value) = seed.parse::<u64>()
        {
            config.options.random_seed = Some(seed_value);
        }

        if let Ok(labeled) = std::env::var("ROTASIM_LABELED_RANDS") {
            config.options.labeled_rands = labeled.parse().unwrap_or(false);
        }

        if let Ok(duration) = std::env::var("ROTASIM_DURATION_SECS")
            && let Ok(seconds) = duration.parse::<u64>()
        {
            config.encounter.duration = Duration::from_secs(seconds);
        }

        if let Ok(health) = std::env::var("ROTASIM_END_AT_HEALTH")
            && let Ok(amount) = health.parse::<f64>()
        {
            config.encounter.end_fight_at_health = amount;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            options: SimOptions::deterministic_testing(),
            encounter: EncounterConfig::fixed(Duration::from_secs(60)),
        }
    }

    /// Creates a configuration for throughput measurements.
    pub fn for_benchmark() -> Self {
        Self {
            options: SimOptions {
                iterations: 100,
                random_seed: Some(7),
                ..Default::default()
            },
            encounter: EncounterConfig::default(),
        }
    }

    /// Checks settings the engine cannot run with.
    ///
    /// # Errors
    /// - `SimError::InvalidConfiguration` - Zero iterations, zero duration or
    ///   negative end health
    /// - `SimError::InvalidPhaseLadder` - Malformed phase ladder
    pub fn validate(&self) -> SimResult<()> {
        if self.options.iterations == 0 {
            return Err(SimError::InvalidConfiguration {
                reason: "iterations must be at least 1".to_string(),
            });
        }
        if self.encounter.duration.is_zero() {
            return Err(SimError::InvalidConfiguration {
                reason: "encounter duration must be positive".to_string(),
            });
        }
        if self.encounter.end_fight_at_health < 0.0 {
            return Err(SimError::InvalidConfiguration {
                reason: format!(
                    "end_fight_at_health {} is negative",
                    self.encounter.end_fight_at_health
                ),
            });
        }
        self.encounter.phase_ladder.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = RotasimConfig::default();

        assert_eq!(config.options.iterations, 1000);
        assert_eq!(config.options.random_seed, None);
        assert_eq!(config.options.progress_interval, Duration::from_millis(100));
        assert_eq!(config.encounter.duration, Duration::from_secs(180));
        assert_eq!(config.encounter.duration_variation, Duration::from_secs(5));
        assert_eq!(config.encounter.end_fight_at_health, 0.0);
        assert_eq!(config.encounter.phase_ladder.thresholds().len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        let testing_config = RotasimConfig::for_testing();
        assert_eq!(testing_config.options.random_seed, Some(42));
        assert!(testing_config.options.labeled_rands);
        assert_eq!(testing_config.encounter.duration_variation, Duration::ZERO);

        let health = EncounterConfig::health_based(1_000_000.0, Duration::from_secs(120));
        assert!(health.duration_is_estimate);
        assert_eq!(health.end_fight_at_health, 1_000_000.0);
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        let mut config = RotasimConfig::for_testing();
        config.options.iterations = 0;
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfiguration { .. })
        ));

        let mut config = RotasimConfig::for_testing();
        config.encounter.end_fight_at_health = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("ROTASIM_ITERATIONS", "250");
            std::env::set_var("ROTASIM_SEED", "12345");
            std::env::set_var("ROTASIM_LABELED_RANDS", "true");
            std::env::set_var("ROTASIM_DURATION_SECS", "300");
            std::env::set_var("ROTASIM_END_AT_HEALTH", "5000000");
        }

        let config = RotasimConfig::from_env();

        assert_eq!(config.options.iterations, 250);
        assert_eq!(config.options.random_seed, Some(12345));
        assert!(config.options.labeled_rands);
        assert_eq!(config.encounter.duration, Duration::from_secs(300));
        assert_eq!(config.encounter.end_fight_at_health, 5_000_000.0);

        // Cleanup
        unsafe {
            std::env::remove_var("ROTASIM_ITERATIONS");
            std::env::remove_var("ROTASIM_SEED");
            std::env::remove_var("ROTASIM_LABELED_RANDS");
            std::env::remove_var("ROTASIM_DURATION_SECS");
            std::env::remove_var("ROTASIM_END_AT_HEALTH");
        }
    }
}

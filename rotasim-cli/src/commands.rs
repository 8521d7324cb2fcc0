//! CLI command implementations

use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use rotasim_core::tracing_setup::CliLogLevel;
use rotasim_core::{EncounterConfig, RotasimConfig, SimError, Simulation};
use tracing::info;

use crate::rotation::build_environment;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Simulate the reference rotation and print a summary
    Run(RunArgs),
    /// Print the resolved configuration without running
    Config(RunArgs),
}

/// Encounter and run settings. Unset values fall back to `ROTASIM_*`
/// environment variables, then to built-in defaults.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of iterations
    #[arg(short, long)]
    pub iterations: Option<u32>,
    /// Base random seed
    #[arg(short, long)]
    pub seed: Option<u64>,
    /// Nominal fight length in seconds
    #[arg(short, long)]
    pub duration: Option<u64>,
    /// Fight length variation in seconds
    #[arg(long)]
    pub variation: Option<u64>,
    /// End the fight once enemies have taken this much damage
    #[arg(long)]
    pub health: Option<f64>,
    /// Number of enemies
    #[arg(long, default_value = "1")]
    pub enemies: usize,
    /// Use one random stream per call-site label
    #[arg(long)]
    pub labeled_rands: bool,
}

impl RunArgs {
    /// Layers the arguments over the environment configuration.
    pub fn resolve(&self, log_level: CliLogLevel) -> RotasimConfig {
        let mut config = RotasimConfig::from_env();

        if let Some(iterations) = self.iterations {
            config.options.iterations = iterations;
        }
        if self.seed.is_some() {
            config.options.random_seed = self.seed;
        }
        if let Some(seconds) = self.duration {
            config.encounter.duration = Duration::from_secs(seconds);
        }
        if let Some(seconds) = self.variation {
            config.encounter.duration_variation = Duration::from_secs(seconds);
        }
        if let Some(health) = self.health {
            config.encounter = EncounterConfig {
                end_fight_at_health: health,
                duration_is_estimate: health > 0.0,
                ..config.encounter
            };
        }
        config.options.labeled_rands |= self.labeled_rands;
        config.options.debug_first_iteration = log_level.shows_combat_log();
        config
    }
}

/// Handle the CLI command
///
/// # Errors
/// - Invalid configuration
/// - Any error raised while simulating
pub fn handle_command(command: Commands, log_level: CliLogLevel) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run_simulation(&args.resolve(log_level), args.enemies),
        Commands::Config(args) => {
            show_config(&args.resolve(log_level), args.enemies);
            Ok(())
        }
    }
}

/// Run the reference rotation
///
/// # Errors
/// - `SimError::InvalidConfiguration`, `SimError::InvalidPhaseLadder` - Bad settings
/// - Any structural error raised while simulating
pub fn run_simulation(config: &RotasimConfig, enemies: usize) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;

    let env = build_environment(config.encounter.clone(), enemies)?;
    let mut sim = Simulation::new(env, config.options.clone())?;
    sim.set_progress_reporter(|progress| {
        info!(
            "Progress: {}/{} iterations, {:.1} dps",
            progress.completed_iterations, progress.total_iterations, progress.avg_dps
        );
    });

    match sim.run() {
        Ok(report) => {
            println!("{}", report.summary());
            Ok(())
        }
        Err(SimError::Aborted {
            completed_iterations,
        }) => {
            println!("Aborted after {completed_iterations} iterations");
            Ok(())
        }
        Err(err) => Err(err).context("simulation failed"),
    }
}

/// Print the resolved configuration
pub fn show_config(config: &RotasimConfig, enemies: usize) {
    println!("Rotasim Configuration");
    println!("{:-<40}", "");
    println!("Iterations:       {}", config.options.iterations);
    match config.options.random_seed {
        Some(seed) => println!("Seed:             {seed}"),
        None => println!("Seed:             random"),
    }
    println!("Labeled rands:    {}", config.options.labeled_rands);
    println!("Duration:         {:?}", config.encounter.duration);
    println!("Variation:        {:?}", config.encounter.duration_variation);
    if config.encounter.end_fight_at_health > 0.0 {
        println!("End at health:    {}", config.encounter.end_fight_at_health);
    }
    println!("Enemies:          {enemies}");

    let ladder = &config.encounter.phase_ladder;
    println!("Phases:           start at {}", ladder.initial_phase());
    for threshold in ladder.thresholds() {
        println!(
            "  phase {:>3} at {:.0}% health or {:.0}% of the fight left",
            threshold.phase,
            threshold.health_fraction * 100.0,
            threshold.time_proportion * 100.0
        );
    }
}

//! Rotasim CLI - Command-line interface
//!
//! Runs the reference rotation against a configurable encounter.

mod commands;
mod rotation;

use std::path::PathBuf;

use clap::Parser;
use rotasim_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "rotasim")]
#[command(about = "A discrete-event combat rotation simulator")]
struct Cli {
    /// Console log level; debug shows the combat log of the first iteration
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,

    /// Directory for the trace log of the last run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;

    commands::handle_command(cli.command, cli.log_level)
}

//! Tracing setup for rotasim
//!
//! Console output at the user's chosen level plus a full trace of the last
//! run on disk. Per-event combat logs are emitted at debug level, so the
//! file always holds the complete timeline of any iteration run with
//! debug logging enabled.

use std::fmt;
use std::fs::{File, create_dir_all};
use std::path::Path;
use std::str::FromStr;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// File name of the trace log inside the logs directory.
pub const LOG_FILE_NAME: &str = "rotasim-last-run.log";

/// Installs the global subscriber: console at `console_level`, file at trace.
///
/// The console honours `RUST_LOG` when set. The file under `logs_dir`
/// (default `./logs`) is truncated at every start, so it always holds the
/// last run only.
///
/// # Errors
/// - `Box<dyn std::error::Error>` - The logs directory or file cannot be
///   created, or a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;
    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(console_level.to_string()),
    };
    // Combat log lines carry their own time and unit fields.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(console_level > Level::INFO)
        .without_time()
        .with_filter(console_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .with_filter(LevelFilter::TRACE);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        level = %console_level,
        trace_file = %log_file_path.display(),
        "Tracing initialized"
    );
    Ok(())
}

/// Log levels selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Run start, progress and summary
    Info,
    /// Per-event combat log
    Debug,
    /// Everything, including queue and schedule internals
    Trace,
}

impl CliLogLevel {
    const ALL: [CliLogLevel; 5] = [
        CliLogLevel::Error,
        CliLogLevel::Warn,
        CliLogLevel::Info,
        CliLogLevel::Debug,
        CliLogLevel::Trace,
    ];

    /// Matching `tracing` level.
    ///
    /// # Examples
    /// ```
    /// use rotasim_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Debug.as_tracing_level(), tracing::Level::DEBUG);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }

    /// Lowercase name, as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        }
    }

    /// True when the level shows the per-event combat log.
    pub fn shows_combat_log(self) -> bool {
        self.as_tracing_level() >= Level::DEBUG
    }
}

impl FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("Invalid log level: {s}"))
    }
}

impl fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_round_trip() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            let parsed: CliLogLevel = level.parse().unwrap();
            assert_eq!(parsed.to_string(), level);
        }
        assert!("loud".parse::<CliLogLevel>().is_err());
        assert!(CliLogLevel::Debug.shows_combat_log());
        assert!(!CliLogLevel::Info.shows_combat_log());
    }

    #[test]
    fn test_init_tracing_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        // A subscriber may already be installed by another test in this binary.
        let _ = init_tracing(Level::WARN, Some(dir.path()));
        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }
}

//! Logging initialization for onboard.
//!
//! Logs go to stderr unless `logging.to_file` is set, in which case they are
//! written to `<state>/logs/onboard-{datetime}.log`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file, when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// Level filter to install: `--debug` wins, then `RUST_LOG`, then config
fn filter_directive(config: &Config, debug_override: bool) -> String {
    if debug_override {
        return "debug".to_string();
    }
    std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone())
}

/// Log file name for a run starting now
fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("onboard-{}.log", timestamp)
}

/// Initialize logging from configuration.
///
/// # Arguments
/// * `config` - Application configuration
/// * `debug_override` - If true, log at debug level (from --debug flag)
///
/// # Returns
/// A `LoggingHandle` that must be kept alive for the duration of the program.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = tracing_subscriber::EnvFilter::new(filter_directive(config, debug_override));

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir).context("Failed to create logs directory")?;

        let log_filename = log_file_name();
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

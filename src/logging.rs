//! Logging configuration using the tracing ecosystem.
//!
//! Logs go to stdout, and optionally to a daily rotating file. The level is
//! taken from `RUST_LOG`, then the configured filter, then a default.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::config::LoggingSettings;

/// Default log level if neither RUST_LOG nor the config sets one.
const DEFAULT_LOG_FILTER: &str = "testgen_jira=info,warn";

/// Initialize the logging system.
///
/// Returns a guard that flushes the file writer on drop; keep it alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the global
/// subscriber is already set.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = build_filter(settings);

    let (file_layer, guard) = if settings.log_to_file {
        let log_dir = get_log_directory()?;
        std::fs::create_dir_all(&log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "testgen-jira.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "testgen-jira starting up");
    if settings.log_to_file {
        if let Some(dir) = log_directory() {
            tracing::debug!(log_dir = %dir.display(), "Log directory");
        }
    }

    Ok(guard)
}

fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(settings))
}

/// The filter from settings, ignoring `RUST_LOG`. An unparsable directive
/// falls back to the default.
fn configured_filter(settings: &LoggingSettings) -> EnvFilter {
    let directive = settings.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Get the log directory path.
fn get_log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(base_dir.join("testgen-jira").join("logs"))
}

/// Get the path where log files are stored.
pub fn log_directory() -> Option<PathBuf> {
    get_log_directory().ok()
}

/// Log application shutdown.
pub fn shutdown() {
    tracing::info!("testgen-jira shutting down");
}

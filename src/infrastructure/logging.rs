//! # Logging Setup
//!
//! Installs the global `tracing` subscriber: a plain-text file layer written
//! through a non-blocking appender, plus a console layer on stderr so stdout
//! stays free for the room transcript.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::config::LoggingConfig;

/// `RUST_LOG` wins over `fallback`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Starts logging for the process. Keep the returned guard alive until exit,
/// dropping it flushes the file writer.
pub fn init(config: &LoggingConfig, filter_override: Option<&str>) -> Result<WorkerGuard> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    }

    // One log per run.
    let log_path = directory.join(&config.file);
    if log_path.exists() {
        let _ = fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(directory, &config.file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter(filter_override.unwrap_or(&config.filter)))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(guard)
}

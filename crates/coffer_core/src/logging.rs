use std::path::Path;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::CofferConfig;

/// Prefix of the daily-rotated log files.
pub const LOG_FILE_PREFIX: &str = "coffer";

/// Filter for `log_level`: the coffer crates log at that level, everything
/// else (HTTP stack, SQLite) only at `warn`.
pub fn filter_for(log_level: &str) -> Result<EnvFilter> {
    let level: Level = log_level
        .trim()
        .parse()
        .with_context(|| format!("invalid log_level '{log_level}'"))?;
    let level = level.as_str().to_ascii_lowercase();
    Ok(EnvFilter::new(format!(
        "warn,coffer_core={level},coffer_wallet={level}"
    )))
}

/// Install the global subscriber. Embedders call this once at startup,
/// usually with [`CofferConfig::logs_dir`], and hold the returned guard
/// until exit so buffered lines are flushed.
///
/// `RUST_LOG` overrides `config.log_level`. Files get plain text; the
/// optional console layer is compact.
pub fn init_logging(config: &CofferConfig, logs_dir: &Path, console: bool) -> Result<WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.log_level)?,
    };
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(console.then(|| fmt::layer().with_target(false).compact()))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}

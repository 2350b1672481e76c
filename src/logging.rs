// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `EQUINOX_LOG` environment variable, in `EnvFilter` directive syntax
//!    (e.g. "debug" or "info,equinox_automation::exec=trace")
//! 3. default to `info`
//!
//! Logs are sent to STDERR; STDOUT carries progress lines and the check
//! plan.

use anyhow::Result;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "EQUINOX_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    if let Some(value) = rejected {
        warn!(env = LOG_ENV, %value, "invalid log filter; using '{DEFAULT_DIRECTIVE}'");
    }
    Ok(())
}

/// The filter to install, and the env value if it had to be ignored.
fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (EnvFilter::new(level_directive(level)), None);
    }

    match env.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVE), Some(directives.to_string())),
        },
        None => (EnvFilter::new(DEFAULT_DIRECTIVE), None),
    }
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

// src/logging.rs

//! Logging setup for `backhaul` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BACKHAUL_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Status logs are sent to STDERR. Events on the [`DIAG_TARGET`] target form
//! the diagnostic channel: executed command lines and the raw output of
//! background processes. They only reach stderr at `debug` or more verbose,
//! and are always written to `[config].diag_log` when one is configured.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{Level, Metadata};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::cli::LogLevel;

/// Tracing target of the diagnostic channel.
pub const DIAG_TARGET: &str = "backhaul::diag";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, diag_log: Option<&Path>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("BACKHAUL_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::INFO),
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(move |meta| stderr_enabled(meta, level)));

    let diag_layer = match diag_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening diagnostic log {:?}", path))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter_fn(|meta| meta.target() == DIAG_TARGET));
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(diag_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

fn stderr_enabled(meta: &Metadata<'_>, level: Level) -> bool {
    if *meta.level() > level {
        return false;
    }
    meta.target() != DIAG_TARGET || level >= Level::DEBUG
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_env_levels() {
        assert_eq!(parse_level_str("Warning"), Some(Level::WARN));
        assert_eq!(parse_level_str(" trace "), Some(Level::TRACE));
        assert_eq!(parse_level_str("loud"), None);
    }
}

//! Diagnostic logging bootstrap.
//!
//! # Responsibility
//! - Route all log records to stderr; stdout carries only the result envelope.
//!
//! # Invariants
//! - `RUST_LOG`, when set, wins over the configured level.
//! - Initialization never panics.

use flexi_logger::{Logger, LoggerHandle, WriteMode};

/// Starts the stderr logger with `level` as the default filter.
///
/// The returned handle must stay alive for the rest of the process.
///
/// # Errors
/// - Returns an error when `level` is not a valid filter spec.
/// - Returns an error when the logger backend fails to start.
pub fn init_logging(level: &str) -> Result<LoggerHandle, String> {
    let level = if level.trim().is_empty() { "warn" } else { level.trim() };

    let handle = Logger::try_with_env_or_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_stderr()
        .write_mode(WriteMode::Direct)
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    log::debug!(
        "event=runner_start version={} level={}",
        env!("CARGO_PKG_VERSION"),
        level
    );

    Ok(handle)
}

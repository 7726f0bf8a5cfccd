//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is resolved with
//! [`effective_level`].

use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Map `-v` repetitions to a level. `0` means "use the configured level".
///
///   -v      → warn
///   -vv     → info
///   -vvv    → debug
///   -vvvv+  → trace
pub fn level_for_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

/// CLI flags beat the configured level. Returns the level and whether it
/// should take precedence over `RUST_LOG`.
pub fn effective_level(verbosity: u8, configured: &str) -> (&str, bool) {
    match level_for_verbosity(verbosity) {
        Some(level) => (level, true),
        None => (configured, false),
    }
}

/// Pick the filter. With `prefer_level`, `level` wins and `RUST_LOG` is the
/// fallback for an unparsable level; otherwise the other way round.
fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    let from_level = || EnvFilter::try_new(level).map_err(|e| e.to_string());
    let from_env = || EnvFilter::try_from_default_env().map_err(|e| e.to_string());

    let filter = if prefer_level {
        from_level().or_else(|_| from_env())
    } else {
        from_env().or_else(|_| from_level())
    };
    filter.map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}

/// Append-mode file writer, or stderr. Never stdout: the console streams
/// replies there.
fn open_writer(log_file: Option<&Path>) -> Result<(BoxMakeWriter, bool), AppError> {
    let Some(path) = log_file else {
        return Ok((BoxMakeWriter::new(std::io::stderr), true));
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Logger(format!("failed to open log file '{}': {e}", path.display())))?;
    Ok((BoxMakeWriter::new(file), false))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init(level: &str, prefer_level: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let filter = build_filter(level, prefer_level)?;
    let (writer, ansi) = open_writer(log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_tiers() {
        assert_eq!(level_for_verbosity(0), None);
        assert_eq!(level_for_verbosity(1), Some("warn"));
        assert_eq!(level_for_verbosity(3), Some("debug"));
        assert_eq!(level_for_verbosity(9), Some("trace"));
    }

    #[test]
    fn cli_verbosity_beats_config() {
        assert_eq!(effective_level(0, "info"), ("info", false));
        assert_eq!(effective_level(2, "error"), ("info", true));
    }

    #[test]
    fn preferred_level_and_directives_build() {
        assert!(build_filter("debug", true).is_ok());
        assert!(build_filter("smriti=trace,reqwest=warn", true).is_ok());
    }

    #[test]
    fn configured_level_builds_without_cli_preference() {
        // RUST_LOG may or may not be set in the test environment; either way
        // a valid configured level must yield a filter.
        assert!(build_filter("warn", false).is_ok());
        assert!(build_filter("smriti=debug", false).is_ok());
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("smriti.log");
        let (_writer, ansi) = open_writer(Some(&path)).unwrap();
        assert!(!ansi);
        assert!(path.exists());
    }
}

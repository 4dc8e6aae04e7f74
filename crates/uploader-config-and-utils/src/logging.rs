//! Logging initialization for the uploader.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to
//! `<base>/logs/uploader.jsonl`, compact lines to stderr.

use crate::{CoreResult, Paths};
use std::path::PathBuf;

/// Initialize logging for the `uploader` service.
///
/// `level` is the default filter; `RUST_LOG` takes precedence when set.
/// Returns the path of the log file.
pub fn init_logging(paths: &Paths, level: &str) -> CoreResult<PathBuf> {
    let log_path = observability::init_with_config(observability::LogConfig {
        service_name: "uploader".into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    })?;
    Ok(log_path)
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("warn"), tracing::Level::WARN);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(parse_level("Warning"), tracing::Level::WARN);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }
}

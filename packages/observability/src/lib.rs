//! # Observability
//!
//! Centralized logging for the Nightscout uploader.
//!
//! Crates log with plain `tracing` macros and never know where the output
//! goes. The binary calls [`init_with_config`] once at startup, which
//! installs a subscriber writing one JSON object per line to a central file:
//! `~/.nightscout-uploader/logs/uploader.jsonl`
//!
//! ```text
//! tail -f ~/.nightscout-uploader/logs/uploader.jsonl | jq
//! ```
//!
//! Fields whose names look like credentials (`api_secret`, `token`, ...)
//! are redacted before they reach the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() -> std::io::Result<()> {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "uploader".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     })?;
//!     tracing::info!("uploader started");
//!     Ok(())
//! }
//! ```

mod json_layer;
mod sink;

use std::io;
use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};
pub use sink::{LogFileWriter, WriterFactory};

/// Directory name under the home directory that holds uploader state.
pub const BASE_DIR_NAME: &str = ".nightscout-uploader";

/// File name of the central log inside `<base>/logs`.
pub const LOG_FILE_NAME: &str = "uploader.jsonl";

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "uploader".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// `~/.nightscout-uploader/logs/uploader.jsonl`, if a home directory exists.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(BASE_DIR_NAME).join("logs").join(LOG_FILE_NAME))
}

/// Install the subscriber with default settings for `service_name`.
pub fn init(service_name: &str) -> io::Result<PathBuf> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber described by `config`.
///
/// Returns the path of the log file being written. Fails if the file cannot
/// be opened or a global subscriber is already installed.
pub fn init_with_config(config: LogConfig) -> io::Result<PathBuf> {
    let log_path = match config.log_path.clone() {
        Some(path) => path,
        None => default_log_path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not determine home directory")
        })?,
    };

    sink::install_subscriber(&config, &log_path)?;
    Ok(log_path)
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

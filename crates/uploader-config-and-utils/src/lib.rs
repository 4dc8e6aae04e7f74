//! Configuration, filesystem paths and logging for the Nightscout uploader.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;

//! Configuration management for the uploader.

use crate::{CoreError, CoreResult, Paths};
use nightscout_gateway::{Endpoints, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default interval between timer-driven flushes of all buffers.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

const ENV_SITE_URL: &str = "NIGHTSCOUT_SITE_URL";
const ENV_API_SECRET: &str = "NIGHTSCOUT_API_SECRET";
const ENV_LOG_LEVEL: &str = "UPLOADER_LOG_LEVEL";

/// Uploader configuration, stored as `config.json` in the base directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Base URL of the Nightscout site; endpoint paths are appended to it.
    pub site_url: String,
    /// Shared API secret. Only its SHA-1 digest is sent.
    pub api_secret: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    pub entries_path: String,
    pub device_status_path: String,
    pub treatments_path: String,
    pub auth_test_path: String,
    /// Interval of the periodic flush run by the binary.
    pub flush_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            site_url: String::new(),
            api_secret: String::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            entries_path: endpoints.entries,
            device_status_path: endpoints.device_status,
            treatments_path: endpoints.treatments,
            auth_test_path: endpoints.auth_test,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the base directory, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the base directory.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from `NIGHTSCOUT_SITE_URL`, `NIGHTSCOUT_API_SECRET` and
    /// `UPLOADER_LOG_LEVEL`, as resolved by `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(site_url) = read(ENV_SITE_URL) {
            self.site_url = site_url;
        }
        if let Some(api_secret) = read(ENV_API_SECRET) {
            self.api_secret = api_secret;
        }
        if let Some(log_level) = read(ENV_LOG_LEVEL) {
            self.log_level = log_level;
        }
    }

    /// The site URL, parsed. Only http and https are accepted.
    pub fn site_url(&self) -> CoreResult<Url> {
        if self.site_url.trim().is_empty() {
            return Err(CoreError::Config(format!(
                "site_url is not set (config.json or {ENV_SITE_URL})"
            )));
        }
        let url = Url::parse(self.site_url.trim())?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CoreError::Config(format!(
                "site_url must be http or https, got {other}"
            ))),
        }
    }

    /// Check everything needed to talk to the site.
    pub fn validate(&self) -> CoreResult<()> {
        self.site_url()?;
        if self.api_secret.is_empty() {
            return Err(CoreError::Config(format!(
                "api_secret is not set (config.json or {ENV_API_SECRET})"
            )));
        }
        if self.flush_interval_secs == 0 {
            return Err(CoreError::Config(
                "flush_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            entries: self.entries_path.clone(),
            device_status: self.device_status_path.clone(),
            treatments: self.treatments_path.clone(),
            auth_test: self.auth_test_path.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

//! File system paths for the uploader.

use crate::{CoreError, CoreResult};
use observability::{BASE_DIR_NAME, LOG_FILE_NAME};
use std::path::PathBuf;

/// Manages file system paths for the uploader.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for uploader state (~/.nightscout-uploader)
    base_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at `~/.nightscout-uploader`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `<base>/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// `<base>/checkpoint.json`, the persisted treatment watermark.
    pub fn checkpoint_file(&self) -> PathBuf {
        self.base_dir.join("checkpoint.json")
    }

    /// `<base>/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// `<base>/logs/uploader.jsonl`
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

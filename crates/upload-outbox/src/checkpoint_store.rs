//! Persistence for the confirmed-treatment watermark.
//!
//! Only `last_confirmed_treatment_timestamp` survives a restart; the queue
//! itself is memory-only.

use crate::{OutboxError, OutboxResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key-value storage for the confirmed-treatment watermark.
pub trait CheckpointStore: Send + Sync {
    /// Read the persisted watermark, `None` if never written or cleared.
    fn load(&self) -> OutboxResult<Option<DateTime<Utc>>>;

    /// Persist the watermark; `None` clears it.
    fn save(&self, value: Option<DateTime<Utc>>) -> OutboxResult<()>;
}

/// Process-local store, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryCheckpointStore {
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> OutboxResult<Option<DateTime<Utc>>> {
        Ok(*self.value.lock())
    }

    fn save(&self, value: Option<DateTime<Utc>>) -> OutboxResult<()> {
        *self.value.lock() = value;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    last_confirmed_treatment_timestamp: Option<DateTime<Utc>>,
}

/// Stores the watermark as a small JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    path: PathBuf,
}

impl JsonFileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn context(&self, action: &str, err: impl std::fmt::Display) -> OutboxError {
        OutboxError::Checkpoint(format!("{action} {}: {err}", self.path.display()))
    }
}

impl CheckpointStore for JsonFileCheckpointStore {
    fn load(&self) -> OutboxResult<Option<DateTime<Utc>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| self.context("reading", e))?;
        let file: CheckpointFile =
            serde_json::from_str(&content).map_err(|e| self.context("parsing", e))?;
        Ok(file.last_confirmed_treatment_timestamp)
    }

    fn save(&self, value: Option<DateTime<Utc>>) -> OutboxResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.context("creating directory for", e))?;
        }
        let content = serde_json::to_string_pretty(&CheckpointFile {
            last_confirmed_treatment_timestamp: value,
        })?;
        std::fs::write(&self.path, content).map_err(|e| self.context("writing", e))?;
        debug!(path = %self.path.display(), "Checkpoint saved");
        Ok(())
    }
}

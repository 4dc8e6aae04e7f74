//! Outbox error types.

use nightscout_gateway::UploadError;
use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Gateway or response error
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Checkpoint store error, with the file or task that failed
    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Modify requested for a treatment the remote API never confirmed
    #[error("Treatment at {0} has no remote id")]
    MissingRemoteId(String),
}

impl OutboxError {
    /// The underlying upload error, if this is one.
    pub fn as_upload(&self) -> Option<&UploadError> {
        match self {
            OutboxError::Upload(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;

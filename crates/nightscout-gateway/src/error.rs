//! Upload error taxonomy.
//!
//! Distinguishes failures that never reached an HTTP status (transport),
//! non-success statuses, and successful statuses whose body could not be used.

use thiserror::Error;

/// Error returned by gateway calls and the operations built on them.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Connection refused, timeout, DNS or TLS failure.
    ///
    /// Not attributable to a status code.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The site answered with a non-2xx status.
    #[error("HTTP error: {status} - {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded as UTF-8.
        body: String,
    },

    /// Missing or undecodable body, or a body with an unexpected shape.
    #[error("Invalid response: {reason}")]
    MalformedResponse { reason: String },

    /// Credentials were rejected (401).
    #[error("Unauthorized")]
    Unauthorized,

    /// The request payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UploadError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        UploadError::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::HttpStatus { status, .. } => Some(*status),
            UploadError::Unauthorized => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UploadError::malformed(err.to_string())
        } else {
            UploadError::Transport(err.to_string())
        }
    }
}

/// Result type alias using UploadError.
pub type UploadResult<T> = Result<T, UploadError>;

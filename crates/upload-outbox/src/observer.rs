//! Flush failure reporting.

use nightscout_gateway::UploadError;
use tracing::error;

/// Receives errors from buffered flushes together with a label naming the
/// buffer that failed.
pub trait ErrorObserver: Send + Sync {
    fn on_error(&self, error: &UploadError, context: &str);
}

impl<F> ErrorObserver for F
where
    F: Fn(&UploadError, &str) + Send + Sync,
{
    fn on_error(&self, error: &UploadError, context: &str) {
        self(error, context)
    }
}

/// Default observer: logs the failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ErrorObserver for LoggingObserver {
    fn on_error(&self, err: &UploadError, context: &str) {
        error!(context = context, error = %err, status = ?err.status(), "Upload failed");
    }
}

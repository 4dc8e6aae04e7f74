//! Single-request delivery of a record batch.

use nightscout_gateway::{created_ids, HttpMethod, NetworkGateway, UploadError};
use serde::Serialize;
use tracing::debug;

/// A failed send, and whether the batch is worth retrying.
#[derive(Debug)]
pub(crate) struct SendFailure {
    pub error: UploadError,
    /// False when the same batch would fail the same way again.
    pub requeue: bool,
}

impl SendFailure {
    fn retryable(error: UploadError) -> Self {
        Self {
            error,
            requeue: true,
        }
    }

    fn fatal(error: UploadError) -> Self {
        Self {
            error,
            requeue: false,
        }
    }
}

impl From<SendFailure> for UploadError {
    fn from(failure: SendFailure) -> Self {
        failure.error
    }
}

/// POST `records` as one JSON array and return one identifier per record.
///
/// An empty slice returns immediately without contacting the server.
/// Gateway failures are retryable. A body that cannot be serialized or a
/// create response of the wrong shape or length is not.
pub(crate) async fn post_records<T: Serialize>(
    gateway: &dyn NetworkGateway,
    endpoint: &str,
    records: &[T],
) -> Result<Vec<String>, SendFailure> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let payload = serde_json::to_value(records)
        .map_err(|err| SendFailure::fatal(UploadError::Serialization(err)))?;

    debug!(endpoint = %endpoint, count = records.len(), "Posting records");

    let response = gateway
        .call(Some(payload), endpoint, HttpMethod::Post)
        .await
        .map_err(SendFailure::retryable)?;

    let ids = created_ids(&response).map_err(SendFailure::fatal)?;
    if ids.len() != records.len() {
        return Err(SendFailure::fatal(UploadError::malformed(format!(
            "Expected {} created records, got {}",
            records.len(),
            ids.len()
        ))));
    }

    Ok(ids)
}

//! Create-response handling.

use crate::{UploadError, UploadResult};
use serde_json::Value;

/// Identifier field on records returned by the remote API.
pub const REMOTE_ID_FIELD: &str = "_id";

/// Placeholder identifier for created records the server did not echo an id for.
///
/// Older servers omit ids; the upload still succeeded and must not be retried.
pub const REMOTE_ID_SENTINEL: &str = "NA";

/// Extract one identifier per created record, in submission order.
///
/// The response must be an array of objects. Objects without a string `_id`
/// yield [`REMOTE_ID_SENTINEL`].
pub fn created_ids(response: &Value) -> UploadResult<Vec<String>> {
    let entries = response
        .as_array()
        .ok_or_else(|| UploadError::malformed("Expected array of objects in JSON response"))?;

    entries
        .iter()
        .map(|entry| {
            let object = entry
                .as_object()
                .ok_or_else(|| UploadError::malformed("Expected array of objects in JSON response"))?;
            Ok(object
                .get(REMOTE_ID_FIELD)
                .and_then(Value::as_str)
                .unwrap_or(REMOTE_ID_SENTINEL)
                .to_string())
        })
        .collect()
}

//! Remote API paths.

use url::form_urlencoded;

/// Paths of the collections the uploader talks to, relative to the site URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub entries: String,
    pub device_status: String,
    pub treatments: String,
    pub auth_test: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            entries: "/api/v1/entries".to_string(),
            device_status: "/api/v1/devicestatus".to_string(),
            treatments: "/api/v1/treatments".to_string(),
            auth_test: "/api/v1/experiments/test".to_string(),
        }
    }
}

impl Endpoints {
    /// Resource path for a single treatment. `id` always stays one path segment.
    pub fn treatment(&self, id: &str) -> String {
        format!("{}/{}", self.treatments.trim_end_matches('/'), encode_segment(id))
    }
}

/// Percent-encode everything but unreserved characters. Spaces come out as
/// `+` from the form encoder and are rewritten; a literal `+` is already `%2B`.
fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

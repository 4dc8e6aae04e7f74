//! Transport seam between the upload engine and the remote API.

use crate::UploadResult;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Methods the remote API is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Authenticated call against the remote API.
///
/// Implementations attach credentials to every request, classify non-2xx
/// statuses as [`crate::UploadError::HttpStatus`], and report a missing or
/// undecodable body as [`crate::UploadError::MalformedResponse`]. They never
/// retry; retry policy belongs to the caller.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    async fn call(
        &self,
        payload: Option<Value>,
        endpoint: &str,
        method: HttpMethod,
    ) -> UploadResult<Value>;
}

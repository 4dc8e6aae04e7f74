//! HTTP implementation of the network gateway.

use crate::{HttpMethod, NetworkGateway, UploadError, UploadResult};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the hashed API secret.
pub const API_SECRET_HEADER: &str = "api-secret";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credential sent in [`API_SECRET_HEADER`]: lowercase hex SHA-1 of the secret.
pub fn api_secret_digest(api_secret: &str) -> String {
    hex::encode(Sha1::digest(api_secret.as_bytes()))
}

/// Nightscout REST client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct NightscoutClient {
    http: Client,
    site_url: Url,
    secret_digest: String,
}

impl NightscoutClient {
    /// Create a client for `site_url` authenticating with `api_secret`.
    pub fn new(site_url: Url, api_secret: &str, timeout: Duration) -> UploadResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            site_url,
            secret_digest: api_secret_digest(api_secret),
        })
    }

    pub fn site_url(&self) -> &Url {
        &self.site_url
    }

    /// Append `endpoint` to the site URL, keeping any path prefix the site has.
    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.site_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl NetworkGateway for NightscoutClient {
    async fn call(
        &self,
        payload: Option<Value>,
        endpoint: &str,
        method: HttpMethod,
    ) -> UploadResult<Value> {
        let url = self.endpoint_url(endpoint);

        debug!(url = %url, method = %method, has_body = payload.is_some(), "Calling Nightscout");

        let mut request = self
            .http
            .request(method.into(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(API_SECRET_HEADER, &self.secret_digest);
        if let Some(payload) = payload {
            request = request.body(serde_json::to_vec(&payload)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(UploadError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if body.is_empty() {
            return Err(UploadError::malformed("No data in response"));
        }

        serde_json::from_slice(&body)
            .map_err(|e| UploadError::malformed(format!("Undecodable JSON body: {}", e)))
    }
}

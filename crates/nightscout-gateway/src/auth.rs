//! Credential check against the site's diagnostic endpoint.

use crate::{HttpMethod, NetworkGateway, UploadError, UploadResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validates the configured API secret independently of the upload queue.
#[derive(Clone)]
pub struct AuthProber {
    gateway: Arc<dyn NetworkGateway>,
    endpoint: String,
}

impl AuthProber {
    pub fn new(gateway: Arc<dyn NetworkGateway>, endpoint: impl Into<String>) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
        }
    }

    /// Issue a single GET with no payload.
    ///
    /// A 401 becomes [`UploadError::Unauthorized`]; other statuses and
    /// transport failures pass through. Any 2xx counts as success, whatever
    /// the body looks like.
    pub async fn check(&self) -> UploadResult<()> {
        debug!(endpoint = %self.endpoint, "Checking Nightscout credentials");

        match self.gateway.call(None, &self.endpoint, HttpMethod::Get).await {
            Ok(_) | Err(UploadError::MalformedResponse { .. }) => {
                info!("Nightscout credentials accepted");
                Ok(())
            }
            Err(UploadError::HttpStatus { status: 401, .. }) => {
                warn!("Nightscout rejected the API secret");
                Err(UploadError::Unauthorized)
            }
            Err(err) => Err(err),
        }
    }
}

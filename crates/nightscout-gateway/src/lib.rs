//! Network gateway to a Nightscout site.
//!
//! This crate provides:
//! - [`NetworkGateway`]: the transport seam consumed by the upload engine
//! - [`NightscoutClient`]: HTTP implementation with `api-secret` authentication
//! - [`UploadError`]: transport / status / response-shape error taxonomy
//! - [`AuthProber`]: credential check against the diagnostic endpoint
//! - [`created_ids`]: remote identifiers from a create response

mod auth;
mod client;
mod endpoints;
mod error;
mod gateway;
mod response;

pub use auth::AuthProber;
pub use client::{api_secret_digest, NightscoutClient, API_SECRET_HEADER, DEFAULT_TIMEOUT_SECS};
pub use endpoints::Endpoints;
pub use error::{UploadError, UploadResult};
pub use gateway::{HttpMethod, NetworkGateway};
pub use response::{created_ids, REMOTE_ID_FIELD, REMOTE_ID_SENTINEL};

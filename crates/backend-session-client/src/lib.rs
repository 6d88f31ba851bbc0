//! Client for the authsync backend session API.
//!
//! [`BackendSessionClient`] is the seam the reconciler talks to;
//! [`HttpBackendClient`] is the reqwest implementation. [`ApiClient`] builds
//! every other outbound request and attaches the current bearer credential
//! at call time.

mod api_client;
mod client;
mod error;
mod types;

pub use api_client::ApiClient;
pub use client::{BackendSessionClient, HttpBackendClient};
pub use error::{BackendError, BackendResult};
pub use types::{AuthGrant, FederatedAssertion, ProfileClaims, User, FALLBACK_DISPLAY_NAME};

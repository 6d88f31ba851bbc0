//! Request factory for calls made on behalf of the signed-in user.
//!
//! The Authorization header is computed from the credential slot when each
//! request is built, never cached, so a logout takes effect on the very next
//! request.

use crate::client::{decode_response, endpoint, PROFILE_PATH};
use crate::types::User;
use crate::{BackendError, BackendResult};
use client_storage::CredentialReader;
use reqwest::{Method, RequestBuilder};
use tracing::warn;
use url::Url;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: CredentialReader,
}

impl ApiClient {
    pub(crate) fn new(http: reqwest::Client, base_url: Url, credentials: CredentialReader) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// Build a request to `path` (relative to the backend base URL).
    ///
    /// Carries `Authorization: Bearer <token>` when a credential is stored,
    /// and no Authorization header at all otherwise.
    pub fn request(&self, method: Method, path: &str) -> BackendResult<RequestBuilder> {
        let url = endpoint(&self.base_url, path)?;
        let builder = self.http.request(method, url);

        let header = self.credentials.authorization_header().unwrap_or_else(|e| {
            warn!(error = %e, "Credential slot unreadable, sending request unauthenticated");
            None
        });

        Ok(match header {
            Some(value) => builder.header(reqwest::header::AUTHORIZATION, value),
            None => builder,
        })
    }

    /// Profile of the currently stored credential's user.
    pub async fn get_profile(&self) -> BackendResult<User> {
        let response = self
            .request(Method::GET, PROFILE_PATH)?
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        decode_response(response, "profile", |_| BackendError::InvalidToken).await
    }
}

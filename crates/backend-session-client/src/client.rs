//! Backend session API client.
//!
//! Four calls, each mapping HTTP outcomes onto [`BackendError`]:
//! - 2xx: decoded body, or `UnexpectedResponse` if it does not parse
//! - 4xx: the operation's own rejection variant
//! - 5xx, connect failure, timeout: `BackendUnavailable`

use crate::api_client::ApiClient;
use crate::types::{
    AuthGrant, FederatedAssertion, FederatedLoginRequest, GrantBody, LoginRequest,
    RegisterRequest, User,
};
use crate::{BackendError, BackendResult};
use async_trait::async_trait;
use client_storage::{Credential, CredentialReader};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub(crate) const LOGIN_PATH: &str = "auth/login";
pub(crate) const REGISTER_PATH: &str = "auth/register";
pub(crate) const FEDERATED_LOGIN_PATH: &str = "auth/federated-login";
pub(crate) const PROFILE_PATH: &str = "user/profile";

/// The backend's view of authentication.
#[async_trait]
pub trait BackendSessionClient: Send + Sync {
    /// Trade a federated identity assertion for a backend credential.
    async fn exchange_federated(&self, assertion: &FederatedAssertion) -> BackendResult<AuthGrant>;

    async fn login(&self, email: &str, password: &str) -> BackendResult<AuthGrant>;

    /// Create an account. Does not authenticate.
    async fn register(&self, name: &str, email: &str, password: &str) -> BackendResult<()>;

    /// Resolve a stored credential to the user it belongs to.
    async fn verify(&self, credential: &Credential) -> BackendResult<User>;
}

/// [`BackendSessionClient`] over HTTP.
#[derive(Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBackendClient {
    /// Build a client for `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: Url, timeout: Duration) -> BackendResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Configuration(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Configuration(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request factory for downstream calls, authorized from `credentials`.
    pub fn api_client(&self, credentials: CredentialReader) -> ApiClient {
        ApiClient::new(self.http.clone(), self.base_url.clone(), credentials)
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        endpoint(&self.base_url, path)
    }
}

pub(crate) fn endpoint(base_url: &Url, path: &str) -> BackendResult<Url> {
    base_url
        .join(path.trim_start_matches('/'))
        .map_err(|e| BackendError::Configuration(format!("{}: {}", path, e)))
}

#[async_trait]
impl BackendSessionClient for HttpBackendClient {
    async fn exchange_federated(&self, assertion: &FederatedAssertion) -> BackendResult<AuthGrant> {
        debug!(uid = %assertion.claims.uid, "Exchanging federated assertion");

        let response = self
            .http
            .post(self.endpoint(FEDERATED_LOGIN_PATH)?)
            .json(&FederatedLoginRequest::from(assertion))
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        let body: GrantBody =
            decode_response(response, "federated-login", BackendError::RejectedAssertion).await?;
        into_grant(body)
    }

    async fn login(&self, email: &str, password: &str) -> BackendResult<AuthGrant> {
        debug!(email = %email, "Logging in");

        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH)?)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        let body: GrantBody =
            decode_response(response, "login", BackendError::InvalidCredentials).await?;
        into_grant(body)
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> BackendResult<()> {
        debug!(email = %email, "Registering account");

        let response = self
            .http
            .post(self.endpoint(REGISTER_PATH)?)
            .json(&RegisterRequest {
                name,
                email,
                password,
            })
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        check_status(response, "register", BackendError::ValidationError).await?;
        Ok(())
    }

    async fn verify(&self, credential: &Credential) -> BackendResult<User> {
        let response = self
            .http
            .get(self.endpoint(PROFILE_PATH)?)
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        decode_response(response, "profile", |_| BackendError::InvalidToken).await
    }
}

fn into_grant(body: GrantBody) -> BackendResult<AuthGrant> {
    if body.token.is_empty() {
        return Err(BackendError::UnexpectedResponse(
            "response carried an empty token".to_string(),
        ));
    }
    Ok(AuthGrant {
        credential: Credential::new(body.token),
        user: body.user,
    })
}

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Human-readable reason from an error body: `message`, then `error`,
/// then the status line.
fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| status.to_string())
}

/// Returns the body text of a 2xx response, or the mapped error.
pub(crate) async fn check_status<F>(
    response: reqwest::Response,
    operation: &'static str,
    reject: F,
) -> BackendResult<String>
where
    F: FnOnce(String) -> BackendError,
{
    let status = response.status();
    let body = response.text().await.map_err(BackendError::from_transport)?;

    if status.is_success() {
        return Ok(body);
    }

    let body_summary = summarize_response_body(&body);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        warn!(operation, status = %status, body_summary = %body_summary, "Backend server error");
        return Err(BackendError::BackendUnavailable(format!(
            "{} returned {}",
            operation, status
        )));
    }

    debug!(operation, status = %status, body_summary = %body_summary, "Backend rejected request");
    Err(reject(rejection_message(status, &body)))
}

pub(crate) async fn decode_response<T, F>(
    response: reqwest::Response,
    operation: &'static str,
    reject: F,
) -> BackendResult<T>
where
    T: DeserializeOwned,
    F: FnOnce(String) -> BackendError,
{
    let body = check_status(response, operation, reject).await?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(operation, error = %e, body_summary = %summarize_response_body(&body), "Undecodable backend response");
        BackendError::UnexpectedResponse(format!("{}: {}", operation, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProfileClaims;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HttpBackendClient {
        let base = Url::parse(&format!("{}/api/", server.uri())).unwrap();
        HttpBackendClient::new(base, Duration::from_secs(2)).unwrap()
    }

    fn grant_body(token: &str) -> serde_json::Value {
        json!({
            "token": token,
            "user": {"id": 7, "name": "Ada", "email": "a@b.com"}
        })
    }

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "a@b.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("abc123")))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server).await.login("a@b.com", "pw").await.unwrap();
        assert_eq!(grant.credential.as_str(), "abc123");
        assert_eq!(grant.user.id, "7");
    }

    #[tokio::test]
    async fn test_login_rejected_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad password"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .login("a@b.com", "bad")
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::InvalidCredentials("Bad password".into()));
    }

    #[tokio::test]
    async fn test_login_throttled_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"message": "Slow down"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .login("a@b.com", "pw")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .login("a@b.com", "pw")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_register_validation_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .and(body_json(
                json!({"name": "Ada", "email": "a@b.com", "password": "pw"}),
            ))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"message": "Email already registered"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .register("Ada", "a@b.com", "pw")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::ValidationError("Email already registered".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_success_ignores_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "ok"})))
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .register("Ada", "a@b.com", "pw")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verify_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 7, "name": "Ada", "email": "a@b.com"})),
            )
            .mount(&server)
            .await;

        let user = client_for(&server)
            .await
            .verify(&Credential::new("abc123"))
            .await
            .unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.name, "Ada");
    }

    #[tokio::test]
    async fn test_verify_rejected_is_invalid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verify(&Credential::new("expired"))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::InvalidToken);
    }

    #[tokio::test]
    async fn test_verify_malformed_body_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verify(&Credential::new("abc123"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UnexpectedResponse(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_exchange_federated_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/federated-login"))
            .and(body_json(json!({
                "idToken": "idt",
                "userData": {"name": "Grace", "email": "g@example.com", "photoURL": ""}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("fed-token")))
            .expect(1)
            .mount(&server)
            .await;

        let assertion = FederatedAssertion {
            id_token: "idt".into(),
            claims: ProfileClaims {
                uid: "uid-1".into(),
                display_name: Some("Grace".into()),
                email: Some("g@example.com".into()),
                photo_url: None,
            },
        };

        let grant = client_for(&server)
            .await
            .exchange_federated(&assertion)
            .await
            .unwrap();
        assert_eq!(grant.credential.as_str(), "fed-token");
    }

    #[tokio::test]
    async fn test_exchange_rejected_assertion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/federated-login"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "audience"})))
            .mount(&server)
            .await;

        let assertion = FederatedAssertion {
            id_token: "idt".into(),
            claims: ProfileClaims::default(),
        };
        let err = client_for(&server)
            .await
            .exchange_federated(&assertion)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::RejectedAssertion("audience".to_string()));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/api/", server.uri())).unwrap();
        let client = HttpBackendClient::new(base, Duration::from_millis(100)).unwrap();

        let err = client.verify(&Credential::new("abc123")).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let base = Url::parse("http://127.0.0.1:1/api/").unwrap();
        let client = HttpBackendClient::new(base, Duration::from_secs(1)).unwrap();

        let err = client.login("a@b.com", "pw").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_rejects_non_base_url() {
        let base = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            HttpBackendClient::new(base, Duration::from_secs(1)),
            Err(BackendError::Configuration(_))
        ));
    }
}

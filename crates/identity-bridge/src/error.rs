//! Error types for the identity provider bridge.

use thiserror::Error;

/// Error type for identity provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The session expired or was replaced after its event was delivered
    #[error("Federated session expired or replaced")]
    SessionExpired,

    /// No session is signed in
    #[error("No federated session")]
    NoSession,

    /// Provider-side sign-out failed
    #[error("Sign-out failed: {0}")]
    SignOut(String),

    /// Browser callback reported an error or was malformed
    #[error("Sign-in callback failed: {0}")]
    Callback(String),

    /// Browser callback never arrived
    #[error("Timed out waiting for sign-in callback")]
    Timeout,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for identity provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

//! Error types for backend calls.

use thiserror::Error;

/// Error type for backend session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network failure, timeout, or a 5xx answer
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend refused the bearer token
    #[error("Token rejected by backend")]
    InvalidToken,

    /// Email/password pair refused; carries the backend's message
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The backend refused the federated identity assertion
    #[error("Identity assertion rejected: {0}")]
    RejectedAssertion(String),

    /// Registration input refused; carries the backend's message
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Success status with a body we could not decode
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Client could not be built from the configured base URL
    #[error("Invalid backend configuration: {0}")]
    Configuration(String),
}

impl BackendError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::BackendUnavailable(_))
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return BackendError::UnexpectedResponse(err.to_string());
        }
        if err.is_timeout() {
            return BackendError::BackendUnavailable("request timed out".to_string());
        }
        BackendError::BackendUnavailable(err.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(BackendError::BackendUnavailable("down".into()).is_transient());
        assert!(!BackendError::InvalidToken.is_transient());
        assert!(!BackendError::InvalidCredentials("Bad password".into()).is_transient());
        assert!(!BackendError::RejectedAssertion("no".into()).is_transient());
        assert!(!BackendError::ValidationError("email taken".into()).is_transient());
        assert!(!BackendError::UnexpectedResponse("bad body".into()).is_transient());
    }

    #[test]
    fn test_validation_error_display_carries_message() {
        let err = BackendError::ValidationError("Email already registered".into());
        assert_eq!(err.to_string(), "Validation failed: Email already registered");
    }
}

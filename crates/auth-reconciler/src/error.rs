//! Error types for the auth reconciler.

use backend_session_client::BackendError;
use client_storage::StorageError;
use thiserror::Error;

/// Error returned to `login`, `register` and `logout` callers.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend refused or could not serve the request
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A newer authentication event (or logout) overtook this request
    #[error("Superseded by a newer authentication event")]
    Superseded,

    /// The reconciler task is gone
    #[error("Auth reconciler has stopped")]
    ReconcilerStopped,

    /// Invalid transition in the reconciler state machine
    #[error("Invalid reconciler transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    /// Returns true if the same request could succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Backend(e) => e.is_transient(),
            AuthError::Superseded => true,
            _ => false,
        }
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

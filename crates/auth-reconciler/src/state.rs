//! Published authentication state.

use backend_session_client::User;
use serde::Serialize;

/// How an authenticated user was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Confirmed by the backend; a credential is stored.
    Backend,
    /// Built from identity provider claims while the backend was
    /// unreachable. No credential is stored.
    ProviderClaims,
}

/// The single authoritative answer to "who is signed in".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthState {
    /// A trigger fired and has not resolved yet.
    Loading,
    Authenticated {
        user: User,
        verification: Verification,
    },
    Anonymous,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            user: self.user().cloned(),
            is_authenticated: self.is_authenticated(),
            loading: self.is_loading(),
        }
    }
}

/// `{ user, is_authenticated, loading }` view for consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub loading: bool,
}

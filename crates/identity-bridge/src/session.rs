//! Federated sessions and the subscription that delivers them.

use backend_session_client::{FederatedAssertion, ProfileClaims};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tokio::sync::watch;

/// A signed-in session at the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedSession {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    id_token: String,
    /// Assigned by the provider on sign-in; distinguishes a session from a
    /// later one for the same user.
    pub(crate) serial: u64,
}

impl FederatedSession {
    pub fn new(uid: impl Into<String>, id_token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            photo_url: None,
            expires_at: Utc::now()
                .checked_add_signed(expires_in)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            id_token: id_token.into(),
            serial: 0,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn claims(&self) -> ProfileClaims {
        ProfileClaims {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
        }
    }

    pub fn to_assertion(&self) -> FederatedAssertion {
        FederatedAssertion {
            id_token: self.id_token.clone(),
            claims: self.claims(),
        }
    }
}

impl fmt::Debug for FederatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedSession")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Stream of session changes.
///
/// The first [`next`](Self::next) yields the current session (possibly
/// `None`) without waiting. Later calls wait for a change. Bursts collapse
/// to the latest value. Dropping the subscription unsubscribes.
pub struct SessionSubscription {
    rx: watch::Receiver<Option<FederatedSession>>,
    primed: bool,
}

impl SessionSubscription {
    pub fn new(rx: watch::Receiver<Option<FederatedSession>>) -> Self {
        Self { rx, primed: false }
    }

    /// Next session value, or `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<Option<FederatedSession>> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;
        Some(self.rx.borrow_and_update().clone())
    }
}

//! Identity provider seam and the in-process implementation.

use crate::{FederatedSession, ProviderError, ProviderResult, SessionSubscription};
use async_trait::async_trait;
use backend_session_client::FederatedAssertion;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

/// A federated identity provider as seen by the reconciler.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session first, then every sign-in and sign-out.
    fn subscribe(&self) -> SessionSubscription;

    /// Fresh assertion for `session`.
    ///
    /// Fails with [`ProviderError::SessionExpired`] if `session` has expired
    /// or is no longer the provider's current session.
    async fn assertion(&self, session: &FederatedSession) -> ProviderResult<FederatedAssertion>;

    /// Best-effort provider sign-out.
    async fn sign_out(&self) -> ProviderResult<()>;
}

/// Provider whose session is pushed in by the embedding application.
pub struct LocalIdentityProvider {
    tx: watch::Sender<Option<FederatedSession>>,
    next_serial: AtomicU64,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx,
            next_serial: AtomicU64::new(1),
        }
    }

    /// Replace the current session and notify subscribers.
    pub fn sign_in(&self, mut session: FederatedSession) -> FederatedSession {
        session.serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        info!(uid = %session.uid, serial = session.serial, "Federated session signed in");
        self.tx.send_replace(Some(session.clone()));
        session
    }

    pub fn current(&self) -> Option<FederatedSession> {
        self.tx.borrow().clone()
    }

    /// Drop the current session. Subscribers hear nothing if there was none.
    fn clear(&self) {
        self.tx.send_if_modified(|current| match current.take() {
            Some(previous) => {
                info!(uid = %previous.uid, "Federated session signed out");
                true
            }
            None => false,
        });
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.tx.subscribe())
    }

    async fn assertion(&self, session: &FederatedSession) -> ProviderResult<FederatedAssertion> {
        let current = self.tx.borrow().clone();
        match current {
            None => Err(ProviderError::NoSession),
            Some(current) if current.serial != session.serial => {
                debug!(uid = %session.uid, "Session replaced before assertion");
                Err(ProviderError::SessionExpired)
            }
            Some(current) if current.is_expired() => Err(ProviderError::SessionExpired),
            Some(current) => Ok(current.to_assertion()),
        }
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.clear();
        Ok(())
    }
}

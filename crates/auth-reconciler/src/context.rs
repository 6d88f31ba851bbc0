//! Consumer-facing boundary of the reconciler.

use crate::reconciler::ReconcilerMessage;
use crate::{AuthError, AuthResult, AuthSnapshot, AuthState};
use backend_session_client::User;
use tokio::sync::{mpsc, oneshot, watch};

/// Published auth state plus the `login`/`register`/`logout` actions.
///
/// Cheap to clone. The reconciler stops when the last clone is dropped.
#[derive(Clone)]
pub struct AuthContext {
    tx: mpsc::Sender<ReconcilerMessage>,
    state_rx: watch::Receiver<AuthState>,
}

impl AuthContext {
    pub(crate) fn new(
        tx: mpsc::Sender<ReconcilerMessage>,
        state_rx: watch::Receiver<AuthState>,
    ) -> Self {
        Self { tx, state_rx }
    }

    pub fn state(&self) -> AuthState {
        self.state_rx.borrow().clone()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state_rx.borrow().snapshot()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_rx.clone()
    }

    /// Wait until the state is no longer `Loading`.
    pub async fn settled(&self) -> AuthResult<AuthState> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| !state.is_loading())
            .await
            .map_err(|_| AuthError::ReconcilerStopped)?;
        Ok(state.clone())
    }

    /// Email/password login. On failure the published state is unchanged.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<User> {
        self.request(|reply| ReconcilerMessage::Login {
            email: email.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    /// Create an account. Never changes the published state.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult<()> {
        self.request(|reply| ReconcilerMessage::Register {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    /// Sign out everywhere. Resolves once the local session is gone and the
    /// provider sign-out has been attempted.
    pub async fn logout(&self) -> AuthResult<()> {
        self.request(|reply| ReconcilerMessage::Logout { reply }).await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<AuthResult<T>>) -> ReconcilerMessage,
    ) -> AuthResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(message(reply))
            .await
            .map_err(|_| AuthError::ReconcilerStopped)?;
        rx.await.map_err(|_| AuthError::ReconcilerStopped)?
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{user, Fixture};
    use crate::{AuthState, Verification};

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_resolution() {
        let fixture = Fixture::new();
        fixture.store_token("abc123");
        fixture.backend.verify.push(Ok(user("7")));

        let ctx = fixture.start();
        let mut rx = ctx.subscribe();
        assert!(ctx.snapshot().loading);

        let state = rx
            .wait_for(|state| state.is_authenticated())
            .await
            .unwrap()
            .clone();
        assert_eq!(
            state,
            AuthState::Authenticated {
                user: user("7"),
                verification: Verification::Backend,
            }
        );
        assert_eq!(ctx.snapshot().user, Some(user("7")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let fixture = Fixture::new();
        let ctx = fixture.start();
        let other = ctx.clone();

        ctx.settled().await.unwrap();
        assert_eq!(other.state(), AuthState::Anonymous);
    }
}

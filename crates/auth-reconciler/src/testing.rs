//! Scripted fakes for reconciler tests.

use crate::{AuthContext, AuthState, Reconciler, ReconcilerOptions};
use async_trait::async_trait;
use backend_session_client::{
    AuthGrant, BackendError, BackendResult, BackendSessionClient, FederatedAssertion, User,
};
use chrono::Duration as ChronoDuration;
use client_storage::{Credential, MemoryStorage, TokenStore};
use identity_bridge::{
    FederatedSession, IdentityProvider, LocalIdentityProvider, ProviderError, ProviderResult,
    SessionSubscription,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

/// Queue of canned results for one backend operation, optionally gated so
/// a test decides when each call returns.
pub(crate) struct Step<T> {
    results: Mutex<VecDeque<BackendResult<T>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: AtomicUsize,
}

impl<T> Default for Step<T> {
    fn default() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<T> Step<T> {
    pub fn push(&self, result: BackendResult<T>) {
        self.results.lock().push_back(result);
    }

    /// From now on each call waits for one permit.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> BackendResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::BackendUnavailable("unscripted".into())))
    }
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    pub exchange: Step<AuthGrant>,
    pub login: Step<AuthGrant>,
    pub register: Step<()>,
    pub verify: Step<User>,
}

#[async_trait]
impl BackendSessionClient for ScriptedBackend {
    async fn exchange_federated(&self, _assertion: &FederatedAssertion) -> BackendResult<AuthGrant> {
        self.exchange.call().await
    }

    async fn login(&self, _email: &str, _password: &str) -> BackendResult<AuthGrant> {
        self.login.call().await
    }

    async fn register(&self, _name: &str, _email: &str, _password: &str) -> BackendResult<()> {
        self.register.call().await
    }

    async fn verify(&self, _credential: &Credential) -> BackendResult<User> {
        self.verify.call().await
    }
}

/// Provider whose sign-out always fails.
pub(crate) struct StubbornProvider {
    pub inner: LocalIdentityProvider,
}

#[async_trait]
impl IdentityProvider for StubbornProvider {
    fn subscribe(&self) -> SessionSubscription {
        self.inner.subscribe()
    }

    async fn assertion(&self, session: &FederatedSession) -> ProviderResult<FederatedAssertion> {
        self.inner.assertion(session).await
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        Err(ProviderError::SignOut("provider unreachable".into()))
    }
}

/// Provider that can notify subscribers without changing its session.
pub(crate) struct ReplayingProvider {
    tx: watch::Sender<Option<FederatedSession>>,
}

impl ReplayingProvider {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Re-deliver the current value.
    pub fn replay(&self) {
        self.tx.send_modify(|_| {});
    }
}

#[async_trait]
impl IdentityProvider for ReplayingProvider {
    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.tx.subscribe())
    }

    async fn assertion(&self, _session: &FederatedSession) -> ProviderResult<FederatedAssertion> {
        Err(ProviderError::NoSession)
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.tx.send_replace(None);
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub backend: Arc<ScriptedBackend>,
    pub provider: Arc<LocalIdentityProvider>,
    pub store: TokenStore,
    published: Arc<Mutex<Vec<AuthState>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(ScriptedBackend::default()),
            provider: Arc::new(LocalIdentityProvider::new()),
            store: TokenStore::new(Arc::new(MemoryStorage::new())),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn store_token(&self, token: &str) {
        self.store.write(&Credential::new(token)).unwrap();
    }

    pub fn stored_token(&self) -> Option<String> {
        self.store
            .read()
            .unwrap()
            .map(|credential| credential.as_str().to_string())
    }

    pub fn start(&self) -> AuthContext {
        self.start_with(ReconcilerOptions::default())
    }

    pub fn start_with(&self, options: ReconcilerOptions) -> AuthContext {
        let provider: Arc<dyn IdentityProvider> = self.provider.clone();
        self.start_with_provider(options, provider)
    }

    pub fn start_with_provider(
        &self,
        options: ReconcilerOptions,
        provider: Arc<dyn IdentityProvider>,
    ) -> AuthContext {
        let published = Arc::clone(&self.published);
        let backend: Arc<dyn BackendSessionClient> = self.backend.clone();
        Reconciler::new(backend, provider, self.store.clone(), options)
            .with_state_callback(Box::new(move |state| published.lock().push(state.clone())))
            .spawn()
    }

    pub fn published(&self) -> Vec<AuthState> {
        self.published.lock().clone()
    }

    pub fn authenticated_publications(&self) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|state| state.is_authenticated())
            .count()
    }
}

pub(crate) fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        name: format!("user {}", id),
        email: format!("{}@example.com", id),
        avatar_url: None,
    }
}

pub(crate) fn grant(token: &str, user_id: &str) -> AuthGrant {
    AuthGrant {
        credential: Credential::new(token),
        user: user(user_id),
    }
}

pub(crate) fn session(uid: &str) -> FederatedSession {
    FederatedSession::new(uid, format!("id-token-{}", uid), ChronoDuration::hours(1))
        .with_display_name("Grace")
        .with_email("grace@example.com")
}

/// Let every runnable task finish. Requires a paused clock.
pub(crate) async fn flush() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

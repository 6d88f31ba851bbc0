//! The reconciler actor.
//!
//! One task owns the phase machine, the generation counter, the credential
//! slot and the published [`AuthState`]. Everything reaches it as a
//! [`ReconcilerMessage`]: provider events from the subscription forwarder,
//! requests from [`AuthContext`], and completions of the network calls it
//! spawned. Handling a message never awaits, so no two messages interleave.
//!
//! Each trigger bumps the generation. Spawned calls carry the generation
//! they were issued under and their completions are dropped once a newer
//! trigger has fired.

use crate::auth_fsm::{Phase, PhaseInput, PhaseMachine};
use crate::retry::{verify_with_backoff, RetryConfig};
use crate::{AuthContext, AuthError, AuthResult, AuthState, Verification};
use backend_session_client::{
    AuthGrant, BackendResult, BackendSessionClient, ProfileClaims, User,
};
use client_config_and_utils::{Config, FederatedFallback};
use client_storage::TokenStore;
use identity_bridge::{FederatedSession, IdentityProvider, ProviderError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const QUEUE_CAPACITY: usize = 64;

/// Called with every published state.
pub type StateCallback = Box<dyn Fn(&AuthState) + Send + Sync>;

/// Tunables for a reconciler.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerOptions {
    pub federated_fallback: FederatedFallback,
    pub retry: RetryConfig,
}

impl ReconcilerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            federated_fallback: config.federated_fallback,
            retry: RetryConfig::default(),
        }
    }
}

pub(crate) enum ReconcilerMessage {
    ProviderEvent(Option<FederatedSession>),
    Login {
        email: String,
        password: String,
        reply: oneshot::Sender<AuthResult<User>>,
    },
    Register {
        name: String,
        email: String,
        password: String,
        reply: oneshot::Sender<AuthResult<()>>,
    },
    Logout {
        reply: oneshot::Sender<AuthResult<()>>,
    },
    Completed(Completion),
}

pub(crate) enum Completion {
    Federated {
        generation: u64,
        claims: ProfileClaims,
        outcome: FederatedOutcome,
    },
    Verified {
        generation: u64,
        result: BackendResult<User>,
    },
    LoggedIn {
        generation: u64,
        result: BackendResult<AuthGrant>,
        reply: oneshot::Sender<AuthResult<User>>,
    },
}

pub(crate) enum FederatedOutcome {
    Exchanged(BackendResult<AuthGrant>),
    AssertionFailed(ProviderError),
}

/// Builder for the reconciler task.
pub struct Reconciler {
    backend: Arc<dyn BackendSessionClient>,
    provider: Arc<dyn IdentityProvider>,
    store: TokenStore,
    options: ReconcilerOptions,
    state_callback: Option<StateCallback>,
}

impl Reconciler {
    pub fn new(
        backend: Arc<dyn BackendSessionClient>,
        provider: Arc<dyn IdentityProvider>,
        store: TokenStore,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            backend,
            provider,
            store,
            options,
            state_callback: None,
        }
    }

    /// Set a callback to be notified of every published state.
    pub fn with_state_callback(mut self, callback: StateCallback) -> Self {
        self.state_callback = Some(callback);
        self
    }

    /// Start the reconciler and the provider subscription.
    ///
    /// Must be called from within a tokio runtime. The task stops once every
    /// [`AuthContext`] clone has been dropped.
    pub fn spawn(self) -> AuthContext {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(AuthState::Loading);

        let forwarder = spawn_forwarder(self.provider.as_ref(), tx.downgrade());

        let actor = Actor {
            backend: self.backend,
            provider: self.provider,
            store: self.store,
            options: self.options,
            state_callback: self.state_callback,
            fsm: PhaseMachine::new(),
            generation: 0,
            last_provider_session: None,
            state_tx,
            tx: tx.downgrade(),
        };
        tokio::spawn(actor.run(rx, forwarder));

        AuthContext::new(tx, state_rx)
    }
}

/// Forward provider session changes into the queue.
fn spawn_forwarder(
    provider: &dyn IdentityProvider,
    tx: mpsc::WeakSender<ReconcilerMessage>,
) -> JoinHandle<()> {
    let mut subscription = provider.subscribe();
    tokio::spawn(async move {
        while let Some(session) = subscription.next().await {
            let Some(tx) = tx.upgrade() else { break };
            if tx.send(ReconcilerMessage::ProviderEvent(session)).await.is_err() {
                break;
            }
        }
        debug!("Provider subscription closed");
    })
}

struct Actor {
    backend: Arc<dyn BackendSessionClient>,
    provider: Arc<dyn IdentityProvider>,
    store: TokenStore,
    options: ReconcilerOptions,
    state_callback: Option<StateCallback>,
    fsm: PhaseMachine,
    /// Incremented by every trigger; completions from older generations are
    /// dropped.
    generation: u64,
    /// Latest value seen from the provider subscription.
    last_provider_session: Option<FederatedSession>,
    state_tx: watch::Sender<AuthState>,
    /// Weak so that spawned calls do not keep the queue open.
    tx: mpsc::WeakSender<ReconcilerMessage>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<ReconcilerMessage>, forwarder: JoinHandle<()>) {
        info!("Auth reconciler started");
        while let Some(message) = rx.recv().await {
            self.handle(message);
        }
        forwarder.abort();
        info!("Auth reconciler stopped");
    }

    fn handle(&mut self, message: ReconcilerMessage) {
        match message {
            ReconcilerMessage::ProviderEvent(session) => self.on_provider_event(session),
            ReconcilerMessage::Login {
                email,
                password,
                reply,
            } => self.on_login(email, password, reply),
            ReconcilerMessage::Register {
                name,
                email,
                password,
                reply,
            } => self.on_register(name, email, password, reply),
            ReconcilerMessage::Logout { reply } => self.on_logout(reply),
            ReconcilerMessage::Completed(completion) => self.on_completion(completion),
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn is_current(&self, generation: u64, what: &'static str) -> bool {
        if generation == self.generation {
            return true;
        }
        debug!(
            generation,
            current = self.generation,
            completion = what,
            "Dropping stale completion"
        );
        false
    }

    fn transition(&mut self, input: PhaseInput) -> Result<Phase, AuthError> {
        let from = *self.fsm.state();
        self.fsm.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!("cannot apply {:?} in {:?}", input, from))
        })?;
        let to = *self.fsm.state();
        debug!(from = ?from, to = ?to, input = ?input, generation = self.generation, "Phase transition");
        Ok(to)
    }

    /// Transition for a trigger. Triggers are accepted in every phase the
    /// reconciler can be in when one arrives, so a rejection is only logged.
    fn advance(&mut self, input: PhaseInput) {
        if let Err(e) = self.transition(input) {
            error!(error = %e, "Reconciler phase machine rejected input");
        }
    }

    /// Transition for a completion. A completion the phase machine will not
    /// take is dropped like a stale one.
    fn accept(&mut self, input: PhaseInput, what: &'static str) -> bool {
        match self.transition(input) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, completion = what, "Dropping completion out of phase");
                false
            }
        }
    }

    fn publish(&self, state: AuthState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state.clone();
            true
        });
        if !changed {
            return;
        }

        match &state {
            AuthState::Authenticated { user, verification } => info!(
                user_id = %user.id,
                verification = ?verification,
                generation = self.generation,
                "Auth state: authenticated"
            ),
            AuthState::Anonymous => info!(generation = self.generation, "Auth state: anonymous"),
            AuthState::Loading => debug!(generation = self.generation, "Auth state: loading"),
        }

        if let Some(callback) = &self.state_callback {
            callback(&state);
        }
    }

    fn current_state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    fn clear_credential(&self) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored credential");
        }
    }

    fn store_credential(&self, grant: &AuthGrant) {
        if let Err(e) = self.store.write(&grant.credential) {
            error!(error = %e, "Failed to persist credential; session will not survive restart");
        }
    }

    fn on_provider_event(&mut self, session: Option<FederatedSession>) {
        if session.is_none()
            && self.last_provider_session.is_none()
            && *self.fsm.state() != Phase::Starting
        {
            debug!(generation = self.generation, "Provider still signed out, nothing to reconcile");
            return;
        }
        self.reconcile(session);
    }

    /// Start a fresh reconciliation for `session` under a new generation.
    fn reconcile(&mut self, session: Option<FederatedSession>) {
        let generation = self.next_generation();
        self.last_provider_session = session.clone();

        match session {
            Some(session) => {
                info!(uid = %session.uid, generation, "Federated session observed");
                self.advance(PhaseInput::SessionObserved);
                self.publish(AuthState::Loading);
                self.spawn_federated(generation, session);
            }
            None => {
                debug!(generation, "No federated session, checking stored credential");
                self.resolve_stored_credential(generation);
            }
        }
    }

    /// Verify the stored credential, or settle on `Anonymous` right away
    /// when there is none.
    fn resolve_stored_credential(&mut self, generation: u64) {
        let credential = self.store.read().unwrap_or_else(|e| {
            warn!(error = %e, "Stored credential unreadable, treating as absent");
            None
        });

        match credential {
            Some(credential) => {
                self.advance(PhaseInput::CredentialFound);
                self.publish(AuthState::Loading);

                let backend = Arc::clone(&self.backend);
                let retry = self.options.retry.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = verify_with_backoff(backend.as_ref(), &credential, &retry).await;
                    send_completion(&tx, Completion::Verified { generation, result }).await;
                });
            }
            None => {
                self.advance(PhaseInput::NothingStored);
                self.publish(AuthState::Anonymous);
            }
        }
    }

    fn spawn_federated(&self, generation: u64, session: FederatedSession) {
        let backend = Arc::clone(&self.backend);
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let claims = session.claims();
            let outcome = match provider.assertion(&session).await {
                Ok(assertion) => {
                    FederatedOutcome::Exchanged(backend.exchange_federated(&assertion).await)
                }
                Err(e) => FederatedOutcome::AssertionFailed(e),
            };
            send_completion(
                &tx,
                Completion::Federated {
                    generation,
                    claims,
                    outcome,
                },
            )
            .await;
        });
    }

    fn on_login(
        &mut self,
        email: String,
        password: String,
        reply: oneshot::Sender<AuthResult<User>>,
    ) {
        let generation = self.next_generation();
        info!(email = %email, generation, "Login requested");
        self.advance(PhaseInput::LoginRequested);

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.login(&email, &password).await;
            send_completion(
                &tx,
                Completion::LoggedIn {
                    generation,
                    result,
                    reply,
                },
            )
            .await;
        });
    }

    fn on_register(
        &self,
        name: String,
        email: String,
        password: String,
        reply: oneshot::Sender<AuthResult<()>>,
    ) {
        debug!(email = %email, "Register requested");
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let result = backend
                .register(&name, &email, &password)
                .await
                .map_err(AuthError::from);
            let _ = reply.send(result);
        });
    }

    fn on_logout(&mut self, reply: oneshot::Sender<AuthResult<()>>) {
        let generation = self.next_generation();
        info!(generation, "Logout requested");
        self.advance(PhaseInput::LogoutRequested);
        // The sign-out notification that follows is already accounted for.
        self.last_provider_session = None;

        self.clear_credential();
        self.publish(AuthState::Anonymous);
        self.advance(PhaseInput::LogoutComplete);

        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(e) = provider.sign_out().await {
                warn!(error = %e, "Provider sign-out failed; local session cleared anyway");
            }
            let _ = reply.send(Ok(()));
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Federated {
                generation,
                claims,
                outcome,
            } => {
                if self.is_current(generation, "federated") {
                    self.on_federated(generation, claims, outcome);
                }
            }
            Completion::Verified { generation, result } => {
                if self.is_current(generation, "verify") {
                    self.on_verified(result);
                }
            }
            Completion::LoggedIn {
                generation,
                result,
                reply,
            } => {
                if self.is_current(generation, "login") {
                    self.on_logged_in(result, reply);
                } else {
                    let _ = reply.send(Err(AuthError::Superseded));
                }
            }
        }
    }

    fn on_federated(&mut self, generation: u64, claims: ProfileClaims, outcome: FederatedOutcome) {
        let result = match outcome {
            FederatedOutcome::Exchanged(result) => result,
            FederatedOutcome::AssertionFailed(e) => {
                warn!(uid = %claims.uid, error = %e, "No assertion for federated session, checking stored credential");
                self.resolve_stored_credential(generation);
                return;
            }
        };

        match result {
            Ok(grant) => {
                if !self.accept(PhaseInput::ExchangeSucceeded, "federated") {
                    return;
                }
                self.store_credential(&grant);
                self.publish(AuthState::Authenticated {
                    user: grant.user,
                    verification: Verification::Backend,
                });
            }
            Err(e) if e.is_transient()
                && self.options.federated_fallback == FederatedFallback::ProviderClaims =>
            {
                if !self.accept(PhaseInput::FallbackApplied, "federated") {
                    return;
                }
                let user = claims.provisional_user();
                warn!(
                    uid = %claims.uid,
                    error = %e,
                    "Backend unreachable for federated exchange, using provider claims"
                );
                self.clear_credential();
                self.publish(AuthState::Authenticated {
                    user,
                    verification: Verification::ProviderClaims,
                });
            }
            Err(e) => {
                if !self.accept(PhaseInput::ExchangeRejected, "federated") {
                    return;
                }
                warn!(uid = %claims.uid, error = %e, "Federated exchange failed");
                self.clear_credential();
                self.publish(AuthState::Anonymous);
            }
        }
    }

    fn on_verified(&mut self, result: BackendResult<User>) {
        let input = match &result {
            Ok(_) => PhaseInput::VerifySucceeded,
            Err(_) => PhaseInput::VerifyFailed,
        };
        if !self.accept(input, "verify") {
            return;
        }

        match result {
            Ok(user) => {
                self.publish(AuthState::Authenticated {
                    user,
                    verification: Verification::Backend,
                });
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Stored credential could not be verified, keeping it for the next attempt");
                self.publish(AuthState::Anonymous);
            }
            Err(e) => {
                info!(error = %e, "Stored credential rejected, clearing it");
                self.clear_credential();
                self.publish(AuthState::Anonymous);
            }
        }
    }

    fn on_logged_in(
        &mut self,
        result: BackendResult<AuthGrant>,
        reply: oneshot::Sender<AuthResult<User>>,
    ) {
        match result {
            Ok(grant) => {
                if !self.accept(PhaseInput::LoginSucceeded, "login") {
                    let _ = reply.send(Err(AuthError::Superseded));
                    return;
                }
                self.store_credential(&grant);
                self.publish(AuthState::Authenticated {
                    user: grant.user.clone(),
                    verification: Verification::Backend,
                });
                let _ = reply.send(Ok(grant.user));
            }
            Err(e) => {
                info!(error = %e, "Login failed");
                let state = self.current_state();
                if state.is_loading() {
                    // The login overtook an unresolved reconciliation; redo it.
                    let session = self.last_provider_session.clone();
                    self.reconcile(session);
                } else if state.is_authenticated() {
                    self.advance(PhaseInput::LoginRejectedSignedIn);
                } else {
                    self.advance(PhaseInput::LoginRejected);
                }
                let _ = reply.send(Err(AuthError::Backend(e)));
            }
        }
    }
}

async fn send_completion(tx: &mpsc::WeakSender<ReconcilerMessage>, completion: Completion) {
    if let Some(tx) = tx.upgrade() {
        let _ = tx.send(ReconcilerMessage::Completed(completion)).await;
    }
}

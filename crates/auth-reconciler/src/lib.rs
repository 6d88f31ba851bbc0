//! Authentication state reconciliation.
//!
//! Three sources disagree about who is signed in: the federated identity
//! provider, the credential stored from an earlier login, and the backend.
//! The [`Reconciler`] turns them into one published [`AuthState`], and
//! [`AuthContext`] is what the rest of the application holds.

mod auth_fsm;
mod context;
mod error;
mod reconciler;
mod retry;
mod state;

#[cfg(test)]
mod testing;

pub use auth_fsm::{Phase, PhaseInput, PhaseMachine};
pub use context::AuthContext;
pub use error::{AuthError, AuthResult};
pub use reconciler::{Reconciler, ReconcilerOptions, StateCallback};
pub use retry::RetryConfig;
pub use state::{AuthSnapshot, AuthState, Verification};

//! Reconciler phase machine.
//!
//! Every trigger (provider event, login, logout) may interrupt whatever is
//! in flight, so each non-terminal phase accepts all of them. Completions
//! are only accepted in the phase that issued the matching call.
//!
//! ```text
//!             SessionObserved                ExchangeSucceeded / FallbackApplied
//!  Starting ─────────────────► Exchanging ──────────────────────────────► SignedIn
//!     │                            │ ExchangeRejected                        ▲
//!     │ CredentialFound            ▼                                         │
//!     └──────────────────────► Verifying ──── VerifySucceeded ───────────────┤
//!     │                            │ VerifyFailed                            │
//!     │ NothingStored              ▼                                         │
//!     └──────────────────────► SignedOut ◄── LoginRejected ── LoggingIn ─────┘
//!                                  ▲                            LoginSucceeded
//!                                  └── LogoutComplete ── LoggingOut
//! ```

use rust_fsm::*;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub reconcile_machine(Starting)

    Starting => {
        SessionObserved => Exchanging,
        CredentialFound => Verifying,
        NothingStored => SignedOut,
        LoginRequested => LoggingIn,
        LogoutRequested => LoggingOut
    },
    Exchanging => {
        SessionObserved => Exchanging,
        CredentialFound => Verifying,
        NothingStored => SignedOut,
        ExchangeSucceeded => SignedIn,
        FallbackApplied => SignedIn,
        ExchangeRejected => SignedOut,
        LoginRequested => LoggingIn,
        LogoutRequested => LoggingOut
    },
    Verifying => {
        SessionObserved => Exchanging,
        CredentialFound => Verifying,
        NothingStored => SignedOut,
        VerifySucceeded => SignedIn,
        VerifyFailed => SignedOut,
        LoginRequested => LoggingIn,
        LogoutRequested => LoggingOut
    },
    SignedIn => {
        SessionObserved => Exchanging,
        CredentialFound => Verifying,
        NothingStored => SignedOut,
        LoginRequested => LoggingIn,
        LogoutRequested => LoggingOut
    },
    SignedOut => {
        SessionObserved => Exchanging,
        CredentialFound => Verifying,
        NothingStored => SignedOut,
        LoginRequested => LoggingIn,
        LogoutRequested => LoggingOut
    },
    LoggingIn => {
        SessionObserved => Exchanging,
        CredentialFound => Verifying,
        NothingStored => SignedOut,
        LoginSucceeded => SignedIn,
        LoginRejected => SignedOut,
        LoginRejectedSignedIn => SignedIn,
        LoginRequested => LoggingIn,
        LogoutRequested => LoggingOut
    },
    LoggingOut => {
        LogoutComplete => SignedOut
    }
}

pub use reconcile_machine::Input as PhaseInput;
pub use reconcile_machine::State as Phase;
pub use reconcile_machine::StateMachine as PhaseMachine;

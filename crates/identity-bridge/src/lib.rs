//! Bridge to the federated identity provider.
//!
//! The reconciler sees the provider only through [`IdentityProvider`]:
//! a session stream, assertions for a session, and sign-out.
//! [`LocalIdentityProvider`] is fed by the embedding application, and
//! [`CallbackListener`] completes a browser sign-in on a loopback port.

mod callback;
mod error;
mod provider;
mod session;

pub use callback::CallbackListener;
pub use error::{ProviderError, ProviderResult};
pub use provider::{IdentityProvider, LocalIdentityProvider};
pub use session::{FederatedSession, SessionSubscription};

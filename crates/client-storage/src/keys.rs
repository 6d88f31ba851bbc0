//! Storage key constants.

/// Storage keys used by authsync clients.
pub struct StorageKeys;

impl StorageKeys {
    /// Backend-issued bearer token from the last successful authentication.
    pub const AUTH_TOKEN: &'static str = "token";
}

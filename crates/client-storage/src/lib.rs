//! Credential storage for authsync clients.
//!
//! This crate provides:
//! - [`SecureStorage`]: the key/value backend seam
//! - [`MemoryStorage`] and [`FileStorage`] backends
//! - [`TokenStore`]: the single durable slot holding the current bearer
//!   [`Credential`], plus a read-only [`CredentialReader`] view for request
//!   builders

mod file;
mod keys;
mod memory;
mod token_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use token_store::{Credential, CredentialReader, TokenStore};
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_constants() {
        assert!(!StorageKeys::AUTH_TOKEN.is_empty());
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Encoding("bad json".to_string());
        assert_eq!(err.to_string(), "Encoding error: bad json");
    }
}

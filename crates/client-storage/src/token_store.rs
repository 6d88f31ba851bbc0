//! The single durable credential slot.

use crate::{SecureStorage, StorageKeys, StorageResult};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque backend-issued bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([redacted])")
    }
}

/// Owner of the current [`Credential`].
///
/// Only the reconciler holds a `TokenStore`; everything else gets a
/// [`CredentialReader`] that can look but not write.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SecureStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    pub fn read(&self) -> StorageResult<Option<Credential>> {
        read_credential(self.storage.as_ref())
    }

    /// Overwrites any previous credential.
    pub fn write(&self, credential: &Credential) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::AUTH_TOKEN, credential.as_str())?;
        debug!("Credential stored");
        Ok(())
    }

    /// Idempotent.
    pub fn clear(&self) -> StorageResult<()> {
        if self.storage.delete(StorageKeys::AUTH_TOKEN)? {
            debug!("Credential cleared");
        }
        Ok(())
    }

    pub fn authorization_header(&self) -> StorageResult<Option<String>> {
        Ok(self.read()?.map(|c| c.bearer()))
    }

    /// Read-only view sharing the same backend.
    pub fn reader(&self) -> CredentialReader {
        CredentialReader {
            storage: Arc::clone(&self.storage),
        }
    }
}

/// Read-only handle on the credential slot.
#[derive(Clone)]
pub struct CredentialReader {
    storage: Arc<dyn SecureStorage>,
}

impl CredentialReader {
    pub fn read(&self) -> StorageResult<Option<Credential>> {
        read_credential(self.storage.as_ref())
    }

    pub fn authorization_header(&self) -> StorageResult<Option<String>> {
        Ok(self.read()?.map(|c| c.bearer()))
    }
}

fn read_credential(storage: &dyn SecureStorage) -> StorageResult<Option<Credential>> {
    Ok(storage
        .get(StorageKeys::AUTH_TOKEN)?
        .filter(|token| !token.is_empty())
        .map(Credential))
}

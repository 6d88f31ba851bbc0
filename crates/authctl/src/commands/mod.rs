//! CLI command implementations.

mod auth;
mod federated;

pub use auth::{login, logout, profile, register, status, watch};
pub use federated::federated_login;

use anyhow::{Context, Result};
use auth_reconciler::{AuthContext, AuthState, Reconciler, ReconcilerOptions};
use backend_session_client::{ApiClient, HttpBackendClient};
use client_config_and_utils::{init_logging, Config, Paths};
use client_storage::{FileStorage, TokenStore};
use identity_bridge::LocalIdentityProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Flags shared by every command.
pub struct Globals {
    pub base_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Everything a command needs: config, the running reconciler, and the
/// pieces it was built from.
pub struct Client {
    pub config: Config,
    pub context: AuthContext,
    pub provider: Arc<LocalIdentityProvider>,
    pub api: ApiClient,
}

impl Client {
    /// Load config, start logging, and spawn the reconciler.
    pub fn start(globals: &Globals) -> Result<Self> {
        let paths = match &globals.base_dir {
            Some(dir) => Paths::with_base_dir(dir.clone()),
            None => Paths::new()?,
        };
        paths.ensure_dirs()?;

        let mut config = Config::load(&paths)?;
        if let Some(level) = &globals.log_level {
            config.log_level = level.clone();
        }

        init_logging(&paths, &config.log_level, false)?;

        let backend_url = config.backend_url()?;
        debug!(backend_url = %backend_url, "Starting auth reconciler");

        let backend = HttpBackendClient::new(backend_url, config.request_timeout())
            .context("failed to build backend client")?;
        let store = TokenStore::new(Arc::new(FileStorage::new(paths.session_file())));
        let api = backend.api_client(store.reader());
        let provider = Arc::new(LocalIdentityProvider::new());

        let context = Reconciler::new(
            Arc::new(backend),
            provider.clone(),
            store,
            ReconcilerOptions::from_config(&config),
        )
        .spawn();

        Ok(Self {
            config,
            context,
            provider,
            api,
        })
    }

    /// Wait for startup reconciliation to finish.
    pub async fn settled(&self) -> Result<AuthState> {
        Ok(self.context.settled().await?)
    }
}

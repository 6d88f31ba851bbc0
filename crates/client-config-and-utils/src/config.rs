//! Configuration management for authsync clients.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend API base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default timeout applied to every backend request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default loopback port for the federated sign-in callback.
pub const DEFAULT_CALLBACK_PORT: u16 = 9876;

/// Default time to wait for the federated sign-in callback.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 120;

/// What to do when the identity provider signed the user in but the backend
/// could not be reached to exchange the assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FederatedFallback {
    /// Publish a temporary, unverified user built from the provider's claims.
    #[default]
    ProviderClaims,
    /// Treat the outage like a rejection and stay anonymous.
    Disabled,
}

impl FederatedFallback {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "provider_claims" | "provider-claims" | "on" | "true" => Some(Self::ProviderClaims),
            "disabled" | "off" | "false" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend API base URL; auth endpoints are resolved relative to it.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Timeout for a single backend request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Degraded-mode policy for federated sign-in during backend outages.
    #[serde(default)]
    pub federated_fallback: FederatedFallback,
    /// Loopback port for the federated sign-in callback listener.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// How long to wait for the federated sign-in callback, in seconds.
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_callback_timeout_secs() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            backend_url: default_backend_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            federated_fallback: FederatedFallback::default(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `AUTHSYNC_*` overrides from the given variable lookup.
    ///
    /// Empty or unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = get("AUTHSYNC_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("AUTHSYNC_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(secs) = get("AUTHSYNC_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(policy) =
            get("AUTHSYNC_FEDERATED_FALLBACK").and_then(|s| FederatedFallback::parse(&s))
        {
            self.federated_fallback = policy;
        }
    }

    /// Get the backend URL as a parsed URL.
    ///
    /// The returned URL always ends with `/` so relative endpoint paths join
    /// underneath it instead of replacing the last segment.
    pub fn backend_url(&self) -> CoreResult<Url> {
        let trimmed = self.backend_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(CoreError::Config("backend_url is empty".to_string()));
        }
        Url::parse(&format!("{}/", trimmed)).map_err(CoreError::from)
    }

    /// Timeout applied to backend requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Time to wait for the federated sign-in callback.
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

//! Core configuration, paths, and logging bootstrap shared by every authsync crate.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, FederatedFallback, DEFAULT_BACKEND_URL, DEFAULT_CALLBACK_PORT,
    DEFAULT_CALLBACK_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;

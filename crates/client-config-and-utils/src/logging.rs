//! Logging initialization for authsync clients.
//!
//! Every binary calls [`init_logging`] once at startup. Output goes to the
//! structured JSONL file under [`Paths::log_file`] and, optionally, to stderr.

use crate::{CoreResult, Paths};
use observability::LogConfig;

/// Service name stamped on every log line.
const SERVICE_NAME: &str = "authsync";

/// Initialize the logging system.
///
/// * `level` - default level; `RUST_LOG` takes precedence when set
/// * `also_stderr` - mirror log lines to stderr in compact form
pub fn init_logging(paths: &Paths, level: &str, also_stderr: bool) -> CoreResult<()> {
    paths.ensure_dirs()?;

    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr,
    })?;

    Ok(())
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

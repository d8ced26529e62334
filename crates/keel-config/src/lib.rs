//! Layered configuration shared by the keel daemon and its tooling.
//!
//! Values are resolved by `ortho_config` in increasing precedence: built-in
//! defaults, a TOML file (`--config-path` or `KEEL_CONFIG_PATH`), `KEEL_*`
//! environment variables, and finally command-line flags.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod runtime;
mod socket;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT, default_log_filter, default_log_filter_string,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "KEEL")]
pub struct Config {
    /// Socket the daemon listens on for JSONL requests.
    #[serde(default = "default_socket_endpoint")]
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression, e.g. `info,keeld::dispatch=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Upper bound, in milliseconds, on how long a request waits for the agent.
    ///
    /// Unset means requests wait until the agent settles or the daemon stops.
    #[serde(default)]
    pub ready_timeout_ms: Option<u64>,
    /// JSON snapshot of endpoints restored when the agent starts.
    #[serde(default)]
    pub state_file: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            ready_timeout_ms: None,
            state_file: None,
        }
    }
}

impl Config {
    /// Socket endpoint the daemon binds.
    #[must_use]
    pub const fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Per-request readiness timeout, when one is configured.
    ///
    /// A zero value is treated as unset.
    #[must_use]
    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_ms
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }

    /// Path of the endpoint snapshot to restore, if any.
    #[must_use]
    pub fn state_file(&self) -> Option<&Utf8Path> {
        self.state_file.as_deref()
    }
}

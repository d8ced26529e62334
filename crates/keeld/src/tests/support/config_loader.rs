//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use keel_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that provisions a Unix socket path under a temporary directory.
///
/// Clones share the directory, which lives until the last clone is dropped.
#[derive(Clone)]
pub struct TestConfigLoader {
    socket_dir: Arc<TempDir>,
    ready_timeout: Option<Duration>,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for socket");
        Self {
            socket_dir: Arc::new(dir),
            ready_timeout: None,
        }
    }

    /// Bounds each request's wait for the agent.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Directory holding the socket and runtime files.
    pub fn runtime_dir(&self) -> PathBuf {
        self.socket_dir.path().to_path_buf()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.path().join("keeld.sock")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let socket = Utf8PathBuf::from_path_buf(self.socket_path())
            .expect("temporary socket path was not valid UTF-8");
        Ok(Config {
            daemon_socket: SocketEndpoint::unix(socket),
            ready_timeout_ms: self
                .ready_timeout
                .map(|timeout| u64::try_from(timeout.as_millis()).expect("timeout fits in u64")),
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid socket URL.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("keeld"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}

//! Runtime artefact locations: lock, pid and health files.
//!
//! Artefacts live next to the Unix socket so anything that can find the
//! socket can find the daemon's lifecycle files too. TCP endpoints fall back
//! to a `keel` directory under the user's runtime dir.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{Config, SocketEndpoint};

/// Paths of the files written by the daemon supervisor.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
}

impl RuntimePaths {
    /// Derives the paths from `config` and creates the runtime directory.
    ///
    /// # Errors
    ///
    /// Fails when a Unix socket path has no parent or the directory cannot be
    /// created.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = runtime_directory(config.daemon_socket())?;
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join("keeld.lock"),
            pid_path: runtime_dir.join("keeld.pid"),
            health_path: runtime_dir.join("keeld.health"),
            runtime_dir,
        })
    }

    /// Directory holding the artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Lock file that admits a single daemon.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        &self.pid_path
    }

    /// JSON health snapshot.
    #[must_use]
    pub fn health_path(&self) -> &Path {
        &self.health_path
    }
}

fn runtime_directory(endpoint: &SocketEndpoint) -> Result<PathBuf, RuntimePathsError> {
    match endpoint {
        SocketEndpoint::Unix { path } => path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map(|parent| parent.as_std_path().to_path_buf())
            .ok_or_else(|| RuntimePathsError::MissingSocketParent {
                path: path.to_string(),
            }),
        SocketEndpoint::Tcp { .. } => Ok(default_runtime_directory()),
    }
}

#[cfg(unix)]
fn default_runtime_directory() -> PathBuf {
    dirs::runtime_dir().map_or_else(
        || {
            std::env::temp_dir()
                .join("keel")
                .join(crate::defaults::user_namespace())
        },
        |dir| dir.join("keel"),
    )
}

#[cfg(not(unix))]
fn default_runtime_directory() -> PathBuf {
    std::env::temp_dir().join("keel")
}

/// Errors raised while deriving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The Unix socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Configured socket path.
        path: String,
    },
    /// The runtime directory could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use keel_config::Config;

use super::{Agent, AgentError, EndpointSpec};

const AGENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::agent");

/// Errors that prevent the agent from being built.
#[derive(Debug, Error)]
pub enum AgentStartupError {
    /// The endpoint state file could not be read.
    #[error("failed to read state file '{path}': {source}")]
    StateRead {
        /// State file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The endpoint state file is not valid JSON.
    #[error("failed to parse state file '{path}': {source}")]
    StateParse {
        /// State file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A stored endpoint was rejected by the agent.
    #[error("failed to restore endpoint {id}: {source}")]
    Restore {
        /// Stored endpoint id.
        id: u64,
        /// Validation failure.
        #[source]
        source: AgentError,
    },
}

/// Builds the agent. Runs once, off the request path.
pub trait AgentFactory: Send + Sync {
    /// Produces a ready-to-serve agent.
    ///
    /// # Errors
    ///
    /// Any error is terminal: every request waiting on the agent receives it.
    fn build(&self, config: &Config) -> Result<Agent, AgentStartupError>;
}

/// Factory used by the daemon: an empty agent plus any endpoints listed in
/// the configured state file.
///
/// The state file is a JSON object keyed by endpoint id:
///
/// ```json
/// {"12": {"ipv4": "10.0.0.12", "labels": ["app=web"]}}
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardAgentFactory;

impl AgentFactory for StandardAgentFactory {
    fn build(&self, config: &Config) -> Result<Agent, AgentStartupError> {
        let agent = Agent::new();
        if let Some(path) = config.state_file() {
            let restored = restore_endpoints(&agent, path.as_std_path())?;
            info!(
                target: AGENT_TARGET,
                file = %path,
                restored,
                "restored endpoints from state file"
            );
        }
        Ok(agent)
    }
}

fn restore_endpoints(agent: &Agent, path: &Path) -> Result<usize, AgentStartupError> {
    let raw = fs::read(path).map_err(|source| AgentStartupError::StateRead {
        path: path.to_path_buf(),
        source,
    })?;
    let stored: BTreeMap<u64, EndpointSpec> =
        serde_json::from_slice(&raw).map_err(|source| AgentStartupError::StateParse {
            path: path.to_path_buf(),
            source,
        })?;
    let count = stored.len();
    for (id, spec) in stored {
        agent
            .create_endpoint(id, spec)
            .map_err(|source| AgentStartupError::Restore { id, source })?;
    }
    Ok(count)
}

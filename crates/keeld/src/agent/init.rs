//! Background construction of the agent.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, warn};

use keel_config::Config;
use keel_ready::{ReadyValue, Resolver};

use crate::health::HealthReporter;

use super::{Agent, AgentFactory, AgentStartupError};

const INIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::agent");
const INIT_THREAD_NAME: &str = "agent-init";

/// Readiness of the agent as seen by request handlers.
pub type AgentReady = ReadyValue<Arc<Agent>, Arc<AgentStartupError>>;

/// Handle to the agent initialiser.
///
/// Dropping it detaches the init thread; the readiness value still settles.
#[derive(Debug)]
pub struct AgentInit {
    ready: AgentReady,
    thread: Option<JoinHandle<()>>,
}

impl AgentInit {
    /// Another reader of the agent's readiness.
    #[must_use]
    pub fn ready(&self) -> AgentReady {
        self.ready.clone()
    }

    /// Waits for the init thread to exit.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the factory panicked.
    pub fn join(mut self) -> thread::Result<()> {
        self.thread.take().map_or(Ok(()), JoinHandle::join)
    }
}

/// Starts building the agent on a dedicated thread.
///
/// Returns immediately with a pending readiness value. The factory runs once;
/// its outcome is recorded for every current and future reader. If the
/// factory panics, or the thread cannot be spawned, readers observe the agent
/// as abandoned.
pub fn spawn_initialiser<F>(
    factory: F,
    config: Config,
    reporter: Arc<dyn HealthReporter>,
) -> AgentInit
where
    F: AgentFactory + 'static,
{
    let (ready, resolver) = ReadyValue::new();
    let spawned = thread::Builder::new()
        .name(INIT_THREAD_NAME.to_owned())
        .spawn(move || run_factory(&factory, &config, reporter.as_ref(), &resolver));
    let thread = match spawned {
        Ok(handle) => Some(handle),
        Err(source) => {
            error!(
                target: INIT_TARGET,
                error = %source,
                "failed to spawn agent initialiser"
            );
            None
        }
    };
    AgentInit { ready, thread }
}

fn run_factory(
    factory: &dyn AgentFactory,
    config: &Config,
    reporter: &dyn HealthReporter,
    resolver: &Resolver<Arc<Agent>, Arc<AgentStartupError>>,
) {
    reporter.agent_initialising();
    let settled = match factory.build(config) {
        Ok(agent) => {
            reporter.agent_ready(&agent.health());
            resolver.resolve(Arc::new(agent))
        }
        Err(failure) => {
            reporter.agent_failed(&failure);
            resolver.fail(Arc::new(failure))
        }
    };
    if let Err(conflict) = settled {
        warn!(target: INIT_TARGET, error = %conflict, "agent readiness settled twice");
    }
}

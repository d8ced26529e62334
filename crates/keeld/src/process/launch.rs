//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use keel_config::RuntimePaths;
use keel_ready::CancelToken;

use crate::agent::{AgentFactory, StandardAgentFactory};
use crate::api::{WaitPolicy, agent_api_handlers};
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::DispatchConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Process-level collaborators needed to control daemon lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) shutdown: S,
}

/// Service dependencies required to construct the daemon runtime.
pub(crate) struct ServiceDeps<L, F> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) factory: F,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, F, S> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps<L, F>,
}

/// Runs the daemon in the foreground using the production collaborators.
///
/// Blocks until SIGTERM, SIGINT, SIGQUIT or SIGHUP arrives.
///
/// # Errors
///
/// Any failure before the listener is up aborts the launch; afterwards only
/// shutdown and listener errors are reported.
pub fn run_daemon() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::new()?;
    let plan = LaunchPlan {
        process: ProcessControl { shutdown },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            factory: StandardAgentFactory,
        },
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
///
/// The socket only opens once the lock is held. The agent is built in the
/// background, so the API is reachable from that point on: requests that
/// arrive early wait for the agent instead of being refused.
pub(crate) fn run_daemon_with<L, F, S>(plan: LaunchPlan<L, F, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    F: AgentFactory + 'static,
    S: ShutdownSignal,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { shutdown } = process;
    let ServiceDeps {
        loader,
        reporter,
        factory,
    } = services;

    let daemon = bootstrap_with(&loader, reporter)?;
    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let config = daemon.config();
    let runtime_paths = RuntimePaths::from_config(config)?;
    let mut guard = ProcessGuard::acquire(runtime_paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    let init = daemon.start_agent(factory);
    let cancel = CancelToken::new();
    let policy = WaitPolicy::new(cancel.clone()).with_timeout(config.ready_timeout());
    let handlers = agent_api_handlers(&init.ready(), policy, &guard)?;

    let listener = SocketListener::bind(config.daemon_socket())?;
    let handler = Arc::new(DispatchConnectionHandler::new(Arc::new(handlers)));
    let listener_handle = listener.start(handler)?;
    guard.write_health(HealthState::Ready)?;
    info!(
        target: PROCESS_TARGET,
        socket = %config.daemon_socket(),
        runtime_dir = %guard.paths().runtime_dir().display(),
        "daemon accepting requests"
    );

    let waited = shutdown.wait();
    guard.write_health(HealthState::Stopping)?;
    cancel.cancel();
    listener_handle.shutdown();
    if !listener_handle.wait_idle(SHUTDOWN_TIMEOUT) {
        warn!(
            target: PROCESS_TARGET,
            active = listener_handle.active_connections(),
            budget_ms = SHUTDOWN_TIMEOUT.as_millis(),
            "requests still in flight after shutdown budget"
        );
    }
    listener_handle.join()?;
    waited?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

//! The keel agent daemon.
//!
//! `keeld` serves the agent's endpoint and identity API as JSON lines over a
//! Unix or TCP socket configured through [`keel_config`]. Building the agent
//! can take a while, so the daemon does not make clients wait for the socket
//! to appear. The launch sequence is:
//!
//! 1. load configuration, install telemetry and prepare the socket directory;
//! 2. take the singleton lock in the runtime directory;
//! 3. start building the [`Agent`] on a background thread;
//! 4. register every API operation against the agent's pending readiness;
//! 5. open the socket.
//!
//! From step 5 on, requests are accepted immediately. Each one waits for the
//! agent on its own connection thread and then runs. If the agent fails to
//! build, every waiting and future request is answered with `503` and the
//! failure message. On SIGTERM the daemon stops accepting, releases requests
//! still waiting for the agent, and gives in-flight ones a short grace period.
//!
//! The readiness primitive itself lives in [`keel_ready`]; the [`api`] module
//! shows how handlers are bound to it.

mod agent;
pub mod api;
mod bootstrap;
mod dispatch;
mod health;
mod process;
pub mod telemetry;
mod transport;

pub use agent::{
    Agent, AgentError, AgentFactory, AgentHealth, AgentInit, AgentReady, AgentStartupError,
    DebugInfo, Endpoint, EndpointHealth, EndpointOptions, EndpointPatch, EndpointSpec,
    EndpointState, HealthStatus, Identity, IdentityUsage, IpCacheEntry, Labels,
    MIN_ALLOCATED_IDENTITY, NumericIdentity, STATUS_LOG_CAPACITY, StandardAgentFactory,
    StatusEntry, spawn_initialiser,
};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;

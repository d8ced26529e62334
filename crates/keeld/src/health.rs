//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use keel_config::Config;

use crate::agent::{AgentHealth, AgentStartupError};
use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for lifecycle events, so tests can record what production logs.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked on the init thread before the agent factory runs.
    fn agent_initialising(&self);

    /// Invoked once the agent is built, before requests are released.
    fn agent_ready(&self, health: &AgentHealth);

    /// Invoked when the agent factory fails.
    fn agent_failed(&self, error: &AgentStartupError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn agent_initialising(&self) {
        (**self).agent_initialising();
    }

    fn agent_ready(&self, health: &AgentHealth) {
        (**self).agent_ready(health);
    }

    fn agent_failed(&self, error: &AgentStartupError) {
        (**self).agent_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            ready_timeout_ms = ?config.ready_timeout_ms,
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn agent_initialising(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "agent_initialising",
            "building agent"
        );
    }

    fn agent_ready(&self, health: &AgentHealth) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "agent_ready",
            endpoints = health.endpoints,
            identities = health.identities,
            "agent ready; releasing waiting requests"
        );
    }

    fn agent_failed(&self, error: &AgentStartupError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "agent_failed",
            error = %error,
            "agent failed to start; requests will be answered with 503"
        );
    }
}

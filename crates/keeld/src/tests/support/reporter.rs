//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use keel_config::Config;

use crate::agent::{AgentHealth, AgentStartupError};
use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The agent factory is about to run.
    AgentInitialising,
    /// The agent was built with this many endpoints.
    AgentReady { endpoints: usize },
    /// The agent factory failed with a message.
    AgentFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn agent_initialising(&self) {
        self.record(HealthEvent::AgentInitialising);
    }

    fn agent_ready(&self, health: &AgentHealth) {
        self.record(HealthEvent::AgentReady {
            endpoints: health.endpoints,
        });
    }

    fn agent_failed(&self, error: &AgentStartupError) {
        self.record(HealthEvent::AgentFailed(error.to_string()));
    }
}

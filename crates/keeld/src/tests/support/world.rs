//! BDD test world: encapsulates loader, reporter, and daemon/bootstrap state for step functions.

use std::cell::RefCell;
use std::sync::Arc;

use keel_ready::{WaitContext, WaitError};

use crate::agent::{AgentInit, AgentStartupError, StandardAgentFactory};
use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::factories::FailingAgentFactory;
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    init: Option<AgentInit>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            init: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new());
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, self.reporter.clone()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns whether bootstrap produced an error.
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns true when the daemon handle is available.
    pub fn daemon_started(&self) -> bool {
        self.daemon.is_some()
    }

    /// Starts the standard agent, or one that fails with `failure`.
    pub fn start_agent(&mut self, failure: Option<&str>) {
        let Some(daemon) = self.daemon.as_ref() else {
            return;
        };
        let init = match failure {
            Some(message) => daemon.start_agent(FailingAgentFactory::new(message)),
            None => daemon.start_agent(StandardAgentFactory),
        };
        self.init = Some(init);
    }

    /// Waits for the started agent and the init thread.
    pub fn agent_outcome(&mut self) -> Option<Result<(), WaitError<Arc<AgentStartupError>>>> {
        let init = self.init.take()?;
        let ready = init.ready();
        init.join().expect("agent initialiser panicked");
        Some(ready.wait(&WaitContext::background()).map(|_| ()))
    }

    fn reset_results(&mut self) {
        self.daemon = None;
        self.bootstrap_error = None;
        self.init = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

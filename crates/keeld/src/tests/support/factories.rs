//! Agent factories that let scenarios decide when, and how, startup ends.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

use keel_config::Config;

use crate::agent::{Agent, AgentFactory, AgentStartupError};

#[derive(Debug, Clone)]
enum Release {
    Build,
    Fail(String),
}

/// Blocks in [`AgentFactory::build`] until the test releases it.
#[derive(Clone, Default)]
pub struct GatedAgentFactory {
    gate: Arc<(Mutex<Option<Release>>, Condvar)>,
}

impl GatedAgentFactory {
    /// Lets the factory return an empty agent.
    pub fn release(&self) {
        self.open(Release::Build);
    }

    /// Lets the factory fail with `message`.
    pub fn fail(&self, message: &str) {
        self.open(Release::Fail(message.to_owned()));
    }

    fn open(&self, release: Release) {
        let (lock, cvar) = &*self.gate;
        let mut slot = lock.lock().expect("factory gate poisoned");
        *slot = Some(release);
        cvar.notify_all();
    }
}

impl AgentFactory for GatedAgentFactory {
    fn build(&self, _config: &Config) -> Result<Agent, AgentStartupError> {
        let (lock, cvar) = &*self.gate;
        let mut slot = lock.lock().expect("factory gate poisoned");
        let release = loop {
            if let Some(release) = slot.clone() {
                break release;
            }
            slot = cvar.wait(slot).expect("factory gate poisoned during wait");
        };
        match release {
            Release::Build => Ok(Agent::new()),
            Release::Fail(message) => Err(startup_failure(&message)),
        }
    }
}

/// Fails straight away with a fixed message.
#[derive(Clone)]
pub struct FailingAgentFactory {
    message: String,
}

impl FailingAgentFactory {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

impl AgentFactory for FailingAgentFactory {
    fn build(&self, _config: &Config) -> Result<Agent, AgentStartupError> {
        Err(startup_failure(&self.message))
    }
}

fn startup_failure(message: &str) -> AgentStartupError {
    AgentStartupError::StateRead {
        path: PathBuf::from("endpoints.json"),
        source: io::Error::other(message.to_owned()),
    }
}

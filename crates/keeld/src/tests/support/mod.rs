//! Test harness utilities shared by the daemon's behavioural suites.

mod config_loader;
mod factories;
mod process_world;
mod reporter;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use factories::{FailingAgentFactory, GatedAgentFactory};
pub use process_world::{ProcessTestWorld, StepResult, snapshot_status};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};

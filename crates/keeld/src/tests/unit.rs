//! Unit tests for the daemon bootstrap utilities.

use std::sync::Arc;
use std::time::Duration;

use keel_config::{Config, SocketEndpoint};
use keel_ready::{ReadyState, WaitContext, WaitError};
use rstest::rstest;

use crate::bootstrap::ConfigLoader;
use crate::{BootstrapError, StaticConfigLoader, bootstrap_with};

use super::support::{
    FailingAgentFactory, FailingConfigLoader, GatedAgentFactory, HealthEvent,
    RecordingHealthReporter, TestConfigLoader,
};

#[rstest]
fn bootstrap_does_not_start_the_agent() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());

    let daemon = bootstrap_with(&loader, reporter.clone()).expect("bootstrap should succeed");

    assert_eq!(
        reporter.events(),
        vec![HealthEvent::BootstrapStarting, HealthEvent::BootstrapSucceeded]
    );
    assert_eq!(
        daemon.config().daemon_socket(),
        &loader.load().expect("config").daemon_socket
    );
}

#[rstest]
fn bootstrap_reports_configuration_failure() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&FailingConfigLoader, reporter.clone())
        .err()
        .expect("bootstrap should fail");

    assert!(matches!(error, BootstrapError::Configuration { .. }));
    assert!(matches!(
        reporter.events().last(),
        Some(HealthEvent::BootstrapFailed(_))
    ));
}

#[rstest]
fn static_loader_returns_its_configuration() {
    let config = Config {
        daemon_socket: SocketEndpoint::tcp("127.0.0.1", 9890),
        ready_timeout_ms: Some(250),
        ..Config::default()
    };
    let loader = StaticConfigLoader::new(config.clone());

    let loaded = loader.load().expect("static config");
    assert_eq!(loaded, config);
    assert_eq!(loaded.ready_timeout(), Some(Duration::from_millis(250)));
}

#[rstest]
fn started_agent_stays_pending_until_the_factory_returns() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon =
        bootstrap_with(&TestConfigLoader::new(), reporter.clone()).expect("bootstrap");
    let factory = GatedAgentFactory::default();

    let init = daemon.start_agent(factory.clone());
    let ready = init.ready();
    assert_eq!(ready.state(), ReadyState::Pending);

    factory.release();
    init.join().expect("init thread");
    assert_eq!(ready.state(), ReadyState::Resolved);
    assert!(
        reporter
            .events()
            .contains(&HealthEvent::AgentReady { endpoints: 0 })
    );
}

#[rstest]
fn agent_failure_is_terminal_for_every_reader() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon =
        bootstrap_with(&TestConfigLoader::new(), reporter.clone()).expect("bootstrap");

    let init = daemon.start_agent(FailingAgentFactory::new("no state"));
    let first = init.ready();
    let second = init.ready();
    init.join().expect("init thread");

    let context = WaitContext::background().with_timeout(Duration::from_secs(1));
    let (Err(WaitError::Failed(left)), Err(WaitError::Failed(right))) =
        (first.wait(&context), second.wait(&context))
    else {
        panic!("both readers should observe the failure");
    };
    assert!(Arc::ptr_eq(&left, &right));
    assert!(left.to_string().contains("no state"));
}

//! Process supervision test world shared across BDD scenarios.

use std::cell::RefCell;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::health::HealthReporter;
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
use crate::process::shutdown::{ShutdownError, ShutdownSignal};
use crate::process::test_support;

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::factories::GatedAgentFactory;
use super::reporter::RecordingHealthReporter;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

pub type StepResult = Result<(), String>;

type ClientHandle = thread::JoinHandle<Result<Value, String>>;

pub struct ProcessTestWorld {
    loader: TestConfigLoader,
    reporter: Arc<RecordingHealthReporter>,
    factory: GatedAgentFactory,
    shutdown: TestShutdownSignal,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
    clients: Vec<ClientHandle>,
    responses: Vec<Value>,
    health_history: RefCell<Vec<String>>,
}

impl Default for ProcessTestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTestWorld {
    pub fn new() -> Self {
        let world = Self {
            loader: TestConfigLoader::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            factory: GatedAgentFactory::default(),
            shutdown: TestShutdownSignal::new(),
            handle: None,
            result: None,
            clients: Vec::new(),
            responses: Vec::new(),
            health_history: RefCell::new(Vec::new()),
        };
        test_support::clear_health_events(world.health_path().as_path());
        world
    }

    /// Bounds request waits for scenarios that exercise the timeout.
    pub fn use_ready_timeout(&mut self, timeout: Duration) {
        self.loader = self.loader.clone().with_ready_timeout(timeout);
    }

    pub fn start(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already running".to_owned());
        }
        let plan = LaunchPlan {
            process: ProcessControl {
                shutdown: self.shutdown.clone(),
            },
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: self.reporter.clone() as Arc<dyn HealthReporter>,
                factory: self.factory.clone(),
            },
        };
        self.handle = Some(thread::spawn(move || run_daemon_with(plan)));
        Ok(())
    }

    pub fn start_with_invalid_config(&mut self) -> StepResult {
        if self.result.is_some() {
            return Err("result already recorded".to_owned());
        }
        let plan = LaunchPlan {
            process: ProcessControl {
                shutdown: TestShutdownSignal::new(),
            },
            services: ServiceDeps {
                loader: FailingConfigLoader,
                reporter: self.reporter.clone() as Arc<dyn HealthReporter>,
                factory: self.factory.clone(),
            },
        };
        self.result = Some(run_daemon_with(plan));
        Ok(())
    }

    pub fn join(&mut self) -> StepResult {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon not running".to_owned())?;
        match handle.join() {
            Ok(result) => {
                self.result = Some(result);
                Ok(())
            }
            Err(_) => Err("daemon thread panicked".to_owned()),
        }
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    pub const fn factory(&self) -> &GatedAgentFactory {
        &self.factory
    }

    pub fn reporter(&self) -> &RecordingHealthReporter {
        &self.reporter
    }

    /// Sends `request` from a client thread; the response is collected later.
    pub fn send_request(&mut self, request: &str) {
        let socket = self.loader.socket_path();
        let line = format!("{request}\n");
        self.clients
            .push(thread::spawn(move || exchange(&socket, line.as_bytes())));
    }

    /// Whether every request sent so far is still unanswered.
    pub fn requests_pending(&self) -> bool {
        !self.clients.is_empty() && self.clients.iter().all(|client| !client.is_finished())
    }

    pub fn collect_responses(&mut self) -> StepResult {
        for client in self.clients.drain(..) {
            let response = client
                .join()
                .map_err(|_| "client thread panicked".to_owned())??;
            self.responses.push(response);
        }
        Ok(())
    }

    pub fn responses(&self) -> &[Value] {
        &self.responses
    }

    pub fn lock_path(&self) -> PathBuf {
        self.loader.runtime_dir().join("keeld.lock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.loader.runtime_dir().join("keeld.pid")
    }

    pub fn health_path(&self) -> PathBuf {
        self.loader.runtime_dir().join("keeld.health")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.loader.socket_path()
    }

    pub fn read_health(&self) -> Result<Value, String> {
        let content = fs::read_to_string(self.health_path()).map_err(|error| error.to_string())?;
        serde_json::from_str(&content).map_err(|error| error.to_string())
    }

    pub fn write_stale_runtime(&self) -> StepResult {
        fs::write(self.lock_path(), b"").map_err(|error| error.to_string())?;
        fs::write(self.pid_path(), b"0\n").map_err(|error| error.to_string())?;
        Ok(())
    }

    pub fn write_live_runtime(&self) -> StepResult {
        fs::write(self.lock_path(), b"").map_err(|error| error.to_string())?;
        fs::write(self.pid_path(), format!("{}\n", std::process::id()))
            .map_err(|error| error.to_string())
    }

    pub fn last_error(&self) -> Option<&LaunchError> {
        self.result.as_ref()?.as_ref().err()
    }

    pub fn last_result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    pub fn saw_status(&self, expected: &str) -> bool {
        self.health_history
            .borrow()
            .iter()
            .any(|status| status == expected)
            || test_support::health_events(self.health_path().as_path())
                .iter()
                .any(|status| status == expected)
    }

    pub fn wait_for_status(&self, expected: &str) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self.sample_status().as_deref() == Some(expected) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(format!("daemon did not publish {expected} health snapshot"))
    }

    fn sample_status(&self) -> Option<String> {
        let status = match self.read_health() {
            Ok(snapshot) => snapshot_status(&snapshot).to_owned(),
            Err(_) => test_support::health_events(self.health_path().as_path())
                .last()?
                .clone(),
        };
        let mut history = self.health_history.borrow_mut();
        if history.last() != Some(&status) {
            history.push(status.clone());
        }
        Some(status)
    }
}

impl Drop for ProcessTestWorld {
    fn drop(&mut self) {
        // Never leave a daemon thread parked on a scenario that failed early.
        self.factory.release();
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}

fn exchange(socket: &Path, request: &[u8]) -> Result<Value, String> {
    let mut stream = UnixStream::connect(socket).map_err(|error| error.to_string())?;
    stream
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .map_err(|error| error.to_string())?;
    stream.write_all(request).map_err(|error| error.to_string())?;
    stream
        .shutdown(Shutdown::Write)
        .map_err(|error| error.to_string())?;
    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|error| error.to_string())?;
    serde_json::from_str(&line).map_err(|error| format!("{error}: {line:?}"))
}

#[derive(Clone)]
pub struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = cvar
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
        Ok(())
    }
}

pub fn snapshot_status(snapshot: &Value) -> &str {
    snapshot
        .get("status")
        .and_then(Value::as_str)
        .expect("health snapshot should contain a status field")
}

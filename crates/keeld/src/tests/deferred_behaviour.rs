//! Behavioural tests for handlers registered before their value exists.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use keel_ready::{ReadyValue, Resolver};

use crate::api::{ApiResponse, DeferredHandler, Handle, WaitPolicy};

type StepResult = Result<(), String>;
type Operation = fn(&String, String) -> ApiResponse;
type Handler = DeferredHandler<Arc<String>, Arc<String>, Operation>;

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

fn describe(object: &String, params: String) -> ApiResponse {
    ApiResponse::ok(&format!("{object}:{params}"))
}

struct DeferredWorld {
    ready: ReadyValue<Arc<String>, Arc<String>>,
    resolver: Option<Resolver<Arc<String>, Arc<String>>>,
    handler: Arc<Handler>,
    waiting: Vec<JoinHandle<ApiResponse>>,
    blocked_before_calls: usize,
}

impl DeferredWorld {
    fn new() -> Self {
        let (ready, resolver) = ReadyValue::new();
        let handler = DeferredHandler::new(
            "describe",
            ready.clone(),
            WaitPolicy::default(),
            describe as Operation,
        );
        Self {
            ready,
            resolver: Some(resolver),
            handler: Arc::new(handler),
            waiting: Vec::new(),
            blocked_before_calls: 0,
        }
    }

    fn resolver(&self) -> Result<&Resolver<Arc<String>, Arc<String>>, String> {
        self.resolver
            .as_ref()
            .ok_or_else(|| "resolver already consumed".to_owned())
    }

    fn spawn_waiters(&mut self, count: usize) -> StepResult {
        let target = self.ready.blocked_waits() + count;
        for _ in 0..count {
            let handler = Arc::clone(&self.handler);
            self.waiting
                .push(thread::spawn(move || handler.handle("waiting".to_owned())));
        }
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while self.ready.blocked_waits() < target {
            if Instant::now() >= deadline {
                return Err(format!("only {} calls blocked", self.ready.blocked_waits()));
            }
            thread::yield_now();
        }
        Ok(())
    }

    fn join_waiters(&mut self) -> Result<Vec<ApiResponse>, String> {
        self.waiting
            .drain(..)
            .map(|waiter| waiter.join().map_err(|_| "waiting call panicked".to_owned()))
            .collect()
    }
}

fn mentions(response: &ApiResponse, status: u16, message: &str) -> StepResult {
    if response.status != status {
        return Err(format!("expected status {status}, got {response:?}"));
    }
    match response.error_message() {
        Some(error) if error.contains(message) => Ok(()),
        _ => Err(format!("expected error mentioning '{message}', got {response:?}")),
    }
}

#[fixture]
fn world() -> RefCell<DeferredWorld> {
    RefCell::new(DeferredWorld::new())
}

#[given("a handler bound to a pending value")]
fn given_pending_handler(world: &RefCell<DeferredWorld>) -> StepResult {
    let world = world.borrow();
    if world.ready.is_pending() && world.ready.blocked_waits() == 0 {
        Ok(())
    } else {
        Err("binding the handler should neither settle nor wait".to_owned())
    }
}

#[when("{count} calls are waiting for the value")]
fn when_calls_wait(world: &RefCell<DeferredWorld>, count: usize) -> StepResult {
    world.borrow_mut().spawn_waiters(count)
}

#[when("the initialiser fails with \"{message}\"")]
fn when_initialiser_fails(world: &RefCell<DeferredWorld>, message: String) -> StepResult {
    world
        .borrow()
        .resolver()?
        .fail(Arc::new(message))
        .map_err(|error| error.to_string())
}

#[when("the value resolves to \"{object}\"")]
fn when_value_resolves(world: &RefCell<DeferredWorld>, object: String) -> StepResult {
    world
        .borrow()
        .resolver()?
        .resolve(Arc::new(object))
        .map_err(|error| error.to_string())
}

#[when("the handler is called {count} times")]
fn when_handler_called(world: &RefCell<DeferredWorld>, count: usize) -> StepResult {
    let mut world = world.borrow_mut();
    world.blocked_before_calls = world.ready.blocked_waits();
    for call in 0..count {
        let response = world.handler.handle(call.to_string());
        if !response.is_success() {
            return Err(format!("call {call} failed: {response:?}"));
        }
    }
    Ok(())
}

#[then("every waiting call is answered with status {status} mentioning \"{message}\"")]
fn then_waiters_fail(world: &RefCell<DeferredWorld>, status: u16, message: String) -> StepResult {
    let responses = world.borrow_mut().join_waiters()?;
    if responses.is_empty() {
        return Err("no call was waiting".to_owned());
    }
    responses
        .iter()
        .try_for_each(|response| mentions(response, status, &message))
}

#[then("a new call is answered with status {status} mentioning \"{message}\"")]
fn then_new_call_fails(world: &RefCell<DeferredWorld>, status: u16, message: String) -> StepResult {
    let response = world.borrow().handler.handle("late".to_owned());
    mentions(&response, status, &message)
}

#[then("every waiting call is answered with \"{expected}\"")]
fn then_waiters_succeed(world: &RefCell<DeferredWorld>, expected: String) -> StepResult {
    let responses = world.borrow_mut().join_waiters()?;
    let wanted = ApiResponse::ok(&expected);
    match responses.iter().find(|response| **response != wanted) {
        None if !responses.is_empty() => Ok(()),
        None => Err("no call was waiting".to_owned()),
        Some(response) => Err(format!("expected {wanted:?}, got {response:?}")),
    }
}

#[then("calling the handler with \"{params}\" answers \"{expected}\"")]
fn then_call_answers(
    world: &RefCell<DeferredWorld>,
    params: String,
    expected: String,
) -> StepResult {
    let response = world.borrow().handler.handle(params);
    if response.body == Value::String(expected.clone()) {
        Ok(())
    } else {
        Err(format!("expected \"{expected}\", got {response:?}"))
    }
}

#[then("no call blocked on the value")]
fn then_no_call_blocked(world: &RefCell<DeferredWorld>) -> StepResult {
    let world = world.borrow();
    let blocked = world.ready.blocked_waits();
    if blocked == world.blocked_before_calls {
        Ok(())
    } else {
        Err(format!(
            "blocked waits grew from {} to {blocked}",
            world.blocked_before_calls
        ))
    }
}

#[scenario(path = "tests/features/deferred_handlers.feature", index = 0)]
fn failure_reaches_every_waiting_call(world: RefCell<DeferredWorld>) {
    let _ = world;
}

#[scenario(path = "tests/features/deferred_handlers.feature", index = 1)]
fn resolved_value_reaches_the_operation(world: RefCell<DeferredWorld>) {
    let _ = world;
}

#[scenario(path = "tests/features/deferred_handlers.feature", index = 2)]
fn settled_calls_never_block(world: RefCell<DeferredWorld>) {
    let _ = world;
}

//! Handlers that wait for the agent before running.
//!
//! A [`DeferredHandler`] pairs the shared readiness value with one operation
//! function. Registration happens before the agent exists; each call waits
//! for it, then runs the function against the resolved value. Once the value
//! has settled the wait is a single atomic read.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use keel_ready::{CancelToken, ReadyValue, WaitContext};

use super::API_TARGET;
use super::response::ApiResponse;
use super::set::{HandlerSet, HandlerSetBuilder, RegistryError};

/// A callable operation taking typed params.
pub trait Handle<P>: Send + Sync {
    /// Runs the operation.
    fn handle(&self, params: P) -> ApiResponse;
}

/// How long a deferred call is willing to wait for the agent.
///
/// Calls carry no request context of their own, so every call shares this
/// policy: the daemon's shutdown token plus an optional per-call timeout.
#[derive(Debug, Clone, Default)]
pub struct WaitPolicy {
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl WaitPolicy {
    /// Waits until the value settles or `cancel` fires.
    #[must_use]
    pub const fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            timeout: None,
        }
    }

    /// Additionally bounds each call's wait.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Token that releases every waiting call.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fresh context for one call; the timeout starts now.
    #[must_use]
    pub fn context(&self) -> WaitContext {
        let context = WaitContext::background().with_cancel(self.cancel.clone());
        match self.timeout {
            Some(timeout) => context.with_timeout(timeout),
            None => context,
        }
    }
}

/// One operation bound to the shared readiness value.
pub struct DeferredHandler<T, E, F> {
    operation: &'static str,
    ready: ReadyValue<T, E>,
    policy: WaitPolicy,
    run: F,
}

impl<T, E, F> DeferredHandler<T, E, F> {
    /// Binds `run` to `ready`. Does not wait.
    pub const fn new(
        operation: &'static str,
        ready: ReadyValue<T, E>,
        policy: WaitPolicy,
        run: F,
    ) -> Self {
        Self {
            operation,
            ready,
            policy,
            run,
        }
    }
}

impl<T, E, F> fmt::Debug for DeferredHandler<T, E, F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DeferredHandler")
            .field("operation", &self.operation)
            .field("ready", &self.ready)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T, E, P, F> Handle<P> for DeferredHandler<T, E, F>
where
    T: Deref + Clone + Send + Sync + 'static,
    E: fmt::Display + Clone + Send + Sync + 'static,
    F: Fn(&T::Target, P) -> ApiResponse + Send + Sync,
{
    fn handle(&self, params: P) -> ApiResponse {
        let outcome = match self.ready.try_get() {
            Some(settled) => settled,
            None => self.ready.wait(&self.policy.context()),
        };
        match outcome {
            Ok(value) => (self.run)(&*value, params),
            Err(error) => {
                warn!(
                    target: API_TARGET,
                    operation = self.operation,
                    %error,
                    terminal = error.is_terminal(),
                    "agent unavailable"
                );
                ApiResponse::service_unavailable(&error)
            }
        }
    }
}

/// Registers many deferred handlers against one readiness value.
pub struct DeferredRoutes<T, E> {
    ready: ReadyValue<T, E>,
    policy: WaitPolicy,
    builder: HandlerSetBuilder,
}

impl<T, E> DeferredRoutes<T, E>
where
    T: Deref + Clone + Send + Sync + 'static,
    E: fmt::Display + Clone + Send + Sync + 'static,
{
    /// Starts an empty route table sharing `ready` and `policy`.
    #[must_use]
    pub fn new(ready: ReadyValue<T, E>, policy: WaitPolicy) -> Self {
        Self {
            ready,
            policy,
            builder: HandlerSetBuilder::new(),
        }
    }

    /// Adds `operation`, run by `run` once the value is ready.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateOperation`] if `operation` is already routed.
    pub fn route<P, F>(self, operation: &'static str, run: F) -> Result<Self, RegistryError>
    where
        P: DeserializeOwned + 'static,
        F: Fn(&T::Target, P) -> ApiResponse + Send + Sync + 'static,
    {
        let Self {
            ready,
            policy,
            builder,
        } = self;
        let handler = DeferredHandler::new(operation, ready.clone(), policy.clone(), run);
        let builder = builder.register::<P, _>(operation, handler)?;
        Ok(Self {
            ready,
            policy,
            builder,
        })
    }

    /// Freezes the table.
    #[must_use]
    pub fn finish(self) -> HandlerSet {
        self.builder.build()
    }
}

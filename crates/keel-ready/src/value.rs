//! The write-once cell and its single writer.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

use once_cell::sync::OnceCell;

use crate::cancel::{Registration, Wake};
use crate::{AlreadySettled, READY_TARGET, WaitContext, WaitError};

/// Coarse view of a [`ReadyValue`]'s state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with an error, or abandoned by its resolver.
    Failed,
}

enum Outcome<T, E> {
    Resolved(T),
    Failed(E),
    Abandoned,
}

impl<T: Clone, E: Clone> Outcome<T, E> {
    fn observe(&self) -> Result<T, WaitError<E>> {
        match self {
            Self::Resolved(value) => Ok(value.clone()),
            Self::Failed(error) => Err(WaitError::Failed(error.clone())),
            Self::Abandoned => Err(WaitError::Abandoned),
        }
    }
}

impl<T, E> Outcome<T, E> {
    const fn state(&self) -> ReadyState {
        match self {
            Self::Resolved(_) => ReadyState::Resolved,
            Self::Failed(_) | Self::Abandoned => ReadyState::Failed,
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Resolved(_) => "resolved",
            Self::Failed(_) => "failed",
            Self::Abandoned => "abandoned",
        }
    }
}

struct Shared<T, E> {
    outcome: OnceCell<Outcome<T, E>>,
    lock: Mutex<()>,
    settled: Condvar,
    blocked_waits: AtomicUsize,
}

impl<T, E> Shared<T, E> {
    fn new() -> Self {
        Self {
            outcome: OnceCell::new(),
            lock: Mutex::new(()),
            settled: Condvar::new(),
            blocked_waits: AtomicUsize::new(0),
        }
    }

    fn with_outcome(outcome: Outcome<T, E>) -> Self {
        Self {
            outcome: OnceCell::with_value(outcome),
            ..Self::new()
        }
    }

    fn settle(&self, outcome: Outcome<T, E>) -> Result<(), AlreadySettled> {
        let label = outcome.label();
        if self.outcome.set(outcome).is_err() {
            tracing::warn!(
                target: READY_TARGET,
                attempted = label,
                "ignoring repeated settlement of ready value"
            );
            return Err(AlreadySettled);
        }
        tracing::debug!(target: READY_TARGET, outcome = label, "ready value settled");
        self.notify_all();
        Ok(())
    }

    // Taking the lock orders the notification after any waiter's final check.
    fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.settled.notify_all();
    }
}

impl<T: Send + Sync, E: Send + Sync> Wake for Shared<T, E> {
    fn wake(&self) {
        self.notify_all();
    }
}

/// Read handle to a value that is settled exactly once.
///
/// Clones share the same cell. Once settled, [`wait`](Self::wait) returns
/// without taking any lock.
pub struct ReadyValue<T, E> {
    shared: Arc<Shared<T, E>>,
}

/// The single capability allowed to settle a [`ReadyValue`].
///
/// Dropping a resolver that never settled marks the value as abandoned.
pub struct Resolver<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> ReadyValue<T, E> {
    /// Creates a pending value and the resolver that settles it.
    #[must_use]
    pub fn new() -> (Self, Resolver<T, E>) {
        let shared = Arc::new(Shared::new());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Resolver { shared },
        )
    }

    /// Creates a value that is already resolved.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self {
            shared: Arc::new(Shared::with_outcome(Outcome::Resolved(value))),
        }
    }

    /// Creates a value that has already failed.
    #[must_use]
    pub fn failed(error: E) -> Self {
        Self {
            shared: Arc::new(Shared::with_outcome(Outcome::Failed(error))),
        }
    }

    /// Reports whether the value has settled, without blocking.
    #[must_use]
    pub fn state(&self) -> ReadyState {
        self.shared
            .outcome
            .get()
            .map_or(ReadyState::Pending, Outcome::state)
    }

    /// Returns `true` while no outcome has been recorded.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.outcome.get().is_none()
    }

    /// Number of [`wait`](Self::wait) calls that had to block.
    ///
    /// Calls made after settlement never increment this counter.
    #[must_use]
    pub fn blocked_waits(&self) -> usize {
        self.shared.blocked_waits.load(Ordering::Relaxed)
    }
}

impl<T: Clone, E: Clone> ReadyValue<T, E> {
    /// Returns the outcome if the value has settled, without blocking.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<T, WaitError<E>>> {
        self.shared.outcome.get().map(Outcome::observe)
    }
}

impl<T, E> ReadyValue<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Blocks the calling thread until the value settles or `context` gives up.
    ///
    /// Every caller observes the same value or the same terminal error.
    /// Cancellation and deadlines only end this caller's wait.
    pub fn wait(&self, context: &WaitContext) -> Result<T, WaitError<E>> {
        if let Some(outcome) = self.shared.outcome.get() {
            return outcome.observe();
        }
        self.wait_blocking(context)
    }

    fn wait_blocking(&self, context: &WaitContext) -> Result<T, WaitError<E>> {
        self.shared.blocked_waits.fetch_add(1, Ordering::Relaxed);
        let waker: Arc<dyn Wake> = self.shared.clone();
        let _registration: Option<Registration> = context
            .cancel_token()
            .map(|token| token.register(waker));

        let mut guard = self
            .shared
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = self.shared.outcome.get() {
                return outcome.observe();
            }
            if context.is_cancelled() {
                return Err(WaitError::Cancelled);
            }
            guard = match context.deadline() {
                None => self
                    .shared
                    .settled
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::TimedOut);
                    }
                    self.shared
                        .settled
                        .wait_timeout(guard, deadline.duration_since(now))
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

impl<T, E> Clone for ReadyValue<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for ReadyValue<T, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReadyValue")
            .field("state", &self.state())
            .finish()
    }
}

impl<T, E> Resolver<T, E> {
    /// Settles the value successfully.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadySettled`] if the value was settled before; the earlier
    /// outcome is kept.
    pub fn resolve(&self, value: T) -> Result<(), AlreadySettled> {
        self.shared.settle(Outcome::Resolved(value))
    }

    /// Settles the value with a terminal error.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadySettled`] if the value was settled before; the earlier
    /// outcome is kept.
    pub fn fail(&self, error: E) -> Result<(), AlreadySettled> {
        self.shared.settle(Outcome::Failed(error))
    }

    /// Returns `true` once this resolver (or its drop) has settled the value.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.outcome.get().is_some()
    }
}

impl<T, E> Drop for Resolver<T, E> {
    fn drop(&mut self) {
        if self.shared.outcome.set(Outcome::Abandoned).is_ok() {
            tracing::warn!(
                target: READY_TARGET,
                "resolver dropped before settling; value abandoned"
            );
            self.shared.notify_all();
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}

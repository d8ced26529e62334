//! Cancellation tokens shared between a waiter and whoever may abandon it.
//!
//! A [`CancelToken`] never touches the value being awaited. Cancelling only
//! wakes the waiters that registered interest so they can observe the flag
//! and return [`WaitError::Cancelled`](crate::WaitError::Cancelled) to their
//! own caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Something that can be woken when a token is cancelled.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    listeners: Mutex<Listeners>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: HashMap<u64, Arc<dyn Wake>>,
}

/// Cooperative cancellation signal for [`ReadyValue::wait`](crate::ReadyValue::wait).
///
/// Clones share the same flag. Cancellation is one-way and idempotent.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token as cancelled and wakes every registered waiter.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let woken: Vec<Arc<dyn Wake>> = {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            listeners.entries.drain().map(|(_, waker)| waker).collect()
        };
        tracing::debug!(
            target: crate::READY_TARGET,
            waiters = woken.len(),
            "cancel token fired"
        );
        for waker in woken {
            waker.wake();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Registers a waker until the returned guard is dropped.
    ///
    /// Callers must re-check [`is_cancelled`](Self::is_cancelled) after
    /// registering: a token cancelled before registration does not call back.
    pub(crate) fn register(&self, waker: Arc<dyn Wake>) -> Registration {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id = listeners.next_id.wrapping_add(1);
        listeners.entries.insert(id, waker);
        Registration {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a waker registered with a token; removes it on drop.
pub(crate) struct Registration {
    inner: Arc<CancelInner>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.entries.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Default)]
    struct CountingWaker {
        wakes: AtomicUsize,
    }

    impl Wake for CountingWaker {
        fn wake(&self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_wakes_registered_waiters_once() {
        let token = CancelToken::new();
        let waker = Arc::new(CountingWaker::default());
        let _registration = token.register(waker.clone());

        token.cancel();
        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(waker.wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_registration_unregisters_waker() {
        let token = CancelToken::new();
        let waker = Arc::new(CountingWaker::default());
        let registration = token.register(waker.clone());
        assert_eq!(token.registered(), 1);

        drop(registration);
        assert_eq!(token.registered(), 0);

        token.cancel();
        assert_eq!(waker.wakes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

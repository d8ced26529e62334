use std::time::{Duration, Instant};

use crate::CancelToken;

/// Bounds on how long a single caller is prepared to wait.
///
/// A context is owned by one caller. Neither the token nor the deadline has
/// any effect on the value itself.
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl WaitContext {
    /// A context with no cancellation and no deadline: waits until settled.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Attaches a cancel token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attaches an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// The attached cancel token, if any.
    #[must_use]
    pub const fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// The attached deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_context_is_unbounded() {
        let context = WaitContext::background();
        assert!(context.cancel_token().is_none());
        assert!(context.deadline().is_none());
        assert!(!context.is_cancelled());
    }

    #[test]
    fn timeout_sets_future_deadline() {
        let before = Instant::now();
        let context = WaitContext::background().with_timeout(Duration::from_secs(5));
        let deadline = context.deadline().expect("deadline should be set");
        assert!(deadline > before);
    }

    #[test]
    fn reports_cancellation_through_token() {
        let token = CancelToken::new();
        let context = WaitContext::background().with_cancel(token.clone());
        token.cancel();
        assert!(context.is_cancelled());
    }
}

use thiserror::Error;

/// Reasons a [`ReadyValue::wait`](crate::ReadyValue::wait) call can fail.
///
/// `Failed` and `Abandoned` are terminal and shared: every waiter observes the
/// same one. `Cancelled` and `TimedOut` belong to a single caller and leave
/// the value pending for everybody else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError<E> {
    /// The initialiser reported a failure.
    #[error("initialisation failed: {0}")]
    Failed(E),
    /// The resolver was dropped without settling the value.
    #[error("initialiser went away before producing a value")]
    Abandoned,
    /// The caller's cancel token fired while waiting.
    #[error("wait cancelled before the value was ready")]
    Cancelled,
    /// The caller's deadline elapsed while waiting.
    #[error("timed out waiting for the value to become ready")]
    TimedOut,
}

impl<E> WaitError<E> {
    /// Returns `true` when the error reflects the shared, final outcome rather
    /// than this caller giving up.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Abandoned)
    }
}

/// Returned when a resolver is asked to settle a value a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ready value was already settled")]
pub struct AlreadySettled;

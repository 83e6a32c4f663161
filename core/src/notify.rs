//! Observers informed of each retry decision.

use std::fmt;
use std::time::Duration;

/// Receives the error that triggered a retry and the delay about to be awaited.
///
/// Called synchronously, once per retry, before the wait starts. Never called
/// for the final failure of a session.
pub trait Notify<E> {
    /// Observe one retry decision
    fn notify(&mut self, error: &E, delay: Duration);
}

impl<E, F> Notify<E> for F
where
    F: FnMut(&E, Duration),
{
    fn notify(&mut self, error: &E, delay: Duration) {
        self(error, delay)
    }
}

/// No observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl<E> Notify<E> for Silent {
    fn notify(&mut self, _error: &E, _delay: Duration) {}
}

/// Observer that logs every retry decision at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotify {
    operation: &'static str,
}

impl LogNotify {
    /// Log retries under the given operation label
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

impl<E: fmt::Display> Notify<E> for LogNotify {
    fn notify(&mut self, error: &E, delay: Duration) {
        tracing::warn!(
            operation = self.operation,
            ?delay,
            %error,
            "retrying after failure"
        );
    }
}

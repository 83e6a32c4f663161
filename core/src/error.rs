//! Tagged session outcomes.
//!
//! [`Retry::run`](crate::Retry::run) hands back the operation's error untouched.
//! [`Retry::run_detailed`](crate::Retry::run_detailed) returns these types
//! instead, so callers can tell a terminal failure from an exhausted policy or
//! a cancelled wait while the underlying error stays the same value.

use thiserror::Error;

/// Successful session result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    value: T,
    attempts: u32,
}

impl<T> RetryOutcome<T> {
    pub(crate) fn new(value: T, attempts: u32) -> Self {
        Self { value, attempts }
    }

    /// Number of times the operation was invoked, including the successful one
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Borrow the operation's output
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Take the operation's output
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Why a session gave up, carrying the last error unchanged
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The classifier ruled the error not worth retrying
    #[error("non-retryable failure after {attempts} attempt(s): {error}")]
    Terminal {
        /// Error from the last attempt
        error: E,
        /// Attempts made
        attempts: u32,
    },
    /// The backoff policy signalled stop
    #[error("retries exhausted after {attempts} attempt(s): {error}")]
    Exhausted {
        /// Error from the last attempt
        error: E,
        /// Attempts made
        attempts: u32,
    },
    /// The cancellation scope fired during an inter-attempt wait
    #[error("cancelled after {attempts} attempt(s): {error}")]
    Cancelled {
        /// Error from the last attempt
        error: E,
        /// Attempts made
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Borrow the last attempt's error
    pub fn error(&self) -> &E {
        match self {
            RetryError::Terminal { error, .. }
            | RetryError::Exhausted { error, .. }
            | RetryError::Cancelled { error, .. } => error,
        }
    }

    /// Take the last attempt's error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Terminal { error, .. }
            | RetryError::Exhausted { error, .. }
            | RetryError::Cancelled { error, .. } => error,
        }
    }

    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Terminal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The session stopped because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The session stopped because the backoff policy ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

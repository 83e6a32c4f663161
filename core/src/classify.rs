//! Decide whether a failed attempt is worth retrying.
//!
//! The policy is an allow-list: only throttling and transient server faults
//! are retried. Anything unrecognised, including errors that carry no
//! structured service code at all, fails fast.

use std::fmt;

/// Code the store returns when the caller exceeds provisioned write throughput.
pub const THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";

/// Code the store returns for a transient fault on its side.
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";

/// Outcome of classifying one failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A later attempt may succeed
    Retryable,
    /// Retrying cannot help; propagate now
    Terminal,
}

/// Abstract failure categories a classifier can key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller is being rate limited.
    Throttled,
    /// Transient fault inside the remote service.
    ServerFault,
    /// Anything else (validation, permissions, not found, unknown).
    Other,
}

impl ErrorCategory {
    /// Map a category onto the retry decision.
    pub fn classification(self) -> Classification {
        match self {
            ErrorCategory::Throttled | ErrorCategory::ServerFault => Classification::Retryable,
            ErrorCategory::Other => Classification::Terminal,
        }
    }
}

/// Map a store error code onto an [`ErrorCategory`].
pub fn category_for_code(code: &str) -> ErrorCategory {
    match code {
        THROUGHPUT_EXCEEDED => ErrorCategory::Throttled,
        INTERNAL_SERVER_ERROR => ErrorCategory::ServerFault,
        _ => ErrorCategory::Other,
    }
}

/// Errors that may carry a structured code from the remote service.
pub trait ServiceCode {
    /// The service error code, or `None` when the error is not a service error.
    fn service_code(&self) -> Option<&str>;
}

impl<T: ServiceCode + ?Sized> ServiceCode for &T {
    fn service_code(&self) -> Option<&str> {
        (**self).service_code()
    }
}

/// Classifies the error produced by one failed attempt.
///
/// Implemented for any `Fn(&E) -> Classification`, so ad-hoc predicates can be
/// passed straight to [`Retry::classify_with`](crate::Retry::classify_with).
pub trait Classify<E> {
    /// Decide whether `error` should be retried.
    fn classify(&self, error: &E) -> Classification;
}

impl<E, F> Classify<E> for F
where
    F: Fn(&E) -> Classification,
{
    fn classify(&self, error: &E) -> Classification {
        self(error)
    }
}

/// Default classifier for remote-store errors.
///
/// Retries [`THROUGHPUT_EXCEEDED`] and [`INTERNAL_SERVER_ERROR`]; every other
/// code, and every error without a code, is terminal. Each decision is
/// recorded as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreClassifier;

impl<E> Classify<E> for StoreClassifier
where
    E: ServiceCode + fmt::Display,
{
    fn classify(&self, error: &E) -> Classification {
        let Some(code) = error.service_code() else {
            tracing::debug!(%error, "unstructured store error");
            return Classification::Terminal;
        };

        let category = category_for_code(code);
        match category {
            ErrorCategory::Throttled | ErrorCategory::ServerFault => {
                tracing::debug!(code, %error, ?category, "retryable store error");
            }
            ErrorCategory::Other => {
                tracing::debug!(code, %error, "store error");
            }
        }
        category.classification()
    }
}

/// Classifier driven by a caller-supplied categorisation.
///
/// Lets the executor serve other remote services: map their errors onto
/// [`ErrorCategory`] and the retry decision follows.
///
/// # Example
///
/// ```rust
/// use store_retry::{CategoryClassifier, Classification, Classify, ErrorCategory};
///
/// let classifier = CategoryClassifier::new(|status: &u16| match status {
///     429 => ErrorCategory::Throttled,
///     500..=599 => ErrorCategory::ServerFault,
///     _ => ErrorCategory::Other,
/// });
///
/// assert_eq!(classifier.classify(&429), Classification::Retryable);
/// assert_eq!(classifier.classify(&404), Classification::Terminal);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CategoryClassifier<F> {
    categorize: F,
}

impl<F> CategoryClassifier<F> {
    /// Wrap a categorisation function
    pub fn new(categorize: F) -> Self {
        Self { categorize }
    }
}

impl<E, F> Classify<E> for CategoryClassifier<F>
where
    F: Fn(&E) -> ErrorCategory,
{
    fn classify(&self, error: &E) -> Classification {
        (self.categorize)(error).classification()
    }
}

//! Remote-store errors and per-write-kind entry points.
//!
//! The store client itself lives elsewhere; this module only knows how its
//! failures look and offers one retry entry point pair per kind of write.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::backoff::BackOff;
use crate::classify::{ErrorCategory, ServiceCode, category_for_code};
use crate::retry::Retry;

/// Failure reported by the store client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Structured error returned by the service
    #[error("{code}: {message}")]
    Service {
        /// Service error code, e.g. `ProvisionedThroughputExceededException`
        code: String,
        /// Human-readable message from the service
        message: String,
    },
    /// Failure without a service error code (transport, serialization, ...)
    #[error("{0}")]
    Unstructured(String),
}

impl StoreError {
    /// Build a structured service error
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Category of this error for retry purposes
    pub fn category(&self) -> ErrorCategory {
        self.service_code()
            .map_or(ErrorCategory::Other, category_for_code)
    }
}

impl ServiceCode for StoreError {
    fn service_code(&self) -> Option<&str> {
        match self {
            StoreError::Service { code, .. } => Some(code.as_str()),
            StoreError::Unstructured(_) => None,
        }
    }
}

/// Kind of write issued against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// Create or replace an item
    Put,
    /// Modify attributes of an existing item
    Update,
    /// Remove an item
    Delete,
}

impl WriteKind {
    /// Label used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            WriteKind::Put => "put",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }

    /// Retry a write of this kind with the default classifier
    pub async fn retry<I, O, E, F, Fut, B>(self, call: F, input: I, backoff: &mut B) -> Result<O, E>
    where
        I: Clone,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        E: ServiceCode + fmt::Display,
        B: BackOff + ?Sized,
    {
        Retry::new(backoff)
            .operation(self.as_str())
            .run(call, input)
            .await
    }

    /// Retry a write of this kind, calling `notify` before each wait
    pub async fn retry_notify<I, O, E, F, Fut, B, N>(
        self,
        call: F,
        input: I,
        backoff: &mut B,
        notify: N,
    ) -> Result<O, E>
    where
        I: Clone,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        E: ServiceCode + fmt::Display,
        B: BackOff + ?Sized,
        N: FnMut(&E, Duration),
    {
        Retry::new(backoff)
            .operation(self.as_str())
            .notify(notify)
            .run(call, input)
            .await
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry a put (create/replace) call
pub async fn retry_put<I, O, E, F, Fut, B>(call: F, input: I, backoff: &mut B) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
{
    WriteKind::Put.retry(call, input, backoff).await
}

/// Retry a put call, observing each retry
pub async fn retry_notify_put<I, O, E, F, Fut, B, N>(
    call: F,
    input: I,
    backoff: &mut B,
    notify: N,
) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
    N: FnMut(&E, Duration),
{
    WriteKind::Put.retry_notify(call, input, backoff, notify).await
}

/// Retry an update call
pub async fn retry_update<I, O, E, F, Fut, B>(call: F, input: I, backoff: &mut B) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
{
    WriteKind::Update.retry(call, input, backoff).await
}

/// Retry an update call, observing each retry
pub async fn retry_notify_update<I, O, E, F, Fut, B, N>(
    call: F,
    input: I,
    backoff: &mut B,
    notify: N,
) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
    N: FnMut(&E, Duration),
{
    WriteKind::Update
        .retry_notify(call, input, backoff, notify)
        .await
}

/// Retry a delete call
pub async fn retry_delete<I, O, E, F, Fut, B>(call: F, input: I, backoff: &mut B) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
{
    WriteKind::Delete.retry(call, input, backoff).await
}

/// Retry a delete call, observing each retry
pub async fn retry_notify_delete<I, O, E, F, Fut, B, N>(
    call: F,
    input: I,
    backoff: &mut B,
    notify: N,
) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
    N: FnMut(&E, Duration),
{
    WriteKind::Delete
        .retry_notify(call, input, backoff, notify)
        .await
}

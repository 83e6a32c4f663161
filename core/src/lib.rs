//! store-retry - cancellable retry executor for remote-store writes
//!
//! Wraps a single fallible write (put, update, delete) in a retry session:
//! transient failures such as throttling or internal server errors are
//! retried after the delay a [`BackOff`] policy hands out, everything else
//! fails on first occurrence, and every inter-attempt wait can be interrupted
//! through a [`CancelScope`].
//!
//! # Features
//!
//! - **One loop for every write kind**: generic over input, output and error
//! - **Allow-list classification**: unknown errors are never retried
//! - **Interruptible waits**: timer and cancellation raced with `tokio::select!`
//! - **Untouched errors**: the caller gets the last attempt's error verbatim
//! - **Configurable policies** (feature `config`): named policies from TOML
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use store_retry::{ScheduledBackOff, StoreError, THROUGHPUT_EXCEEDED, retry_notify_put};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut backoff = ScheduledBackOff::from_millis([10, 20]);
//! let mut attempts = 0;
//!
//! let result = retry_notify_put(
//!     |key: u64| {
//!         attempts += 1;
//!         let result = if attempts < 3 {
//!             Err(StoreError::service(THROUGHPUT_EXCEEDED, "throttled"))
//!         } else {
//!             Ok(key)
//!         };
//!         std::future::ready(result)
//!     },
//!     42,
//!     &mut backoff,
//!     |err: &StoreError, delay: Duration| println!("retry in {delay:?}: {err}"),
//! )
//! .await;
//!
//! assert_eq!(result, Ok(42));
//! assert_eq!(attempts, 3);
//! # }
//! ```

pub mod backoff;
pub mod cancel;
pub mod classify;
#[cfg(feature = "config")]
pub mod config;
pub mod error;
pub mod notify;
pub mod policy;
pub mod retry;
pub mod store;
pub mod wait;

pub use backoff::{
    BackOff, BackOffPolicy, ConstantBackOff, ScheduledBackOff, StopBackOff, WithMaxRetries,
    ZeroBackOff,
};
pub use cancel::{CancelScope, CancellationToken};
pub use classify::{
    CategoryClassifier, Classification, Classify, ErrorCategory, INTERNAL_SERVER_ERROR,
    ServiceCode, StoreClassifier, THROUGHPUT_EXCEEDED, category_for_code,
};
#[cfg(feature = "config")]
pub use config::{BackOffConfig, BackOffKind, ConfigError, RetryConfig};
pub use error::{RetryError, RetryOutcome};
pub use notify::{LogNotify, Notify, Silent};
pub use policy::PolicyRegistry;
pub use retry::{Retry, retry, retry_notify, retry_notify_until};
pub use store::{
    StoreError, WriteKind, retry_delete, retry_notify_delete, retry_notify_put,
    retry_notify_update, retry_put, retry_update,
};
pub use wait::{WaitOutcome, wait};

//! The retry executor
//!
//! One session runs the operation, classifies any failure, asks the backoff
//! policy for a delay, notifies the observer and waits (racing the wait against
//! cancellation) before trying again. The loop is written once and is generic
//! over the operation's input, output and error types.
//!
//! Attempts are strictly sequential. Cancellation is observed only while
//! waiting between attempts: an attempt that is already running is never
//! aborted, and a scope that fired before the first attempt does not prevent
//! that attempt from running.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::Instrument;

use crate::backoff::BackOff;
use crate::cancel::CancelScope;
use crate::classify::{Classification, Classify, ServiceCode, StoreClassifier};
use crate::error::{RetryError, RetryOutcome};
use crate::notify::{Notify, Silent};
use crate::wait::{WaitOutcome, wait};

/// Builder for configuring and executing one retry session
///
/// # Type Parameters
///
/// * `B` - The backoff policy type
/// * `C` - The classifier type
/// * `N` - The notify observer type
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use store_retry::{ConstantBackOff, Retry, StoreError, THROUGHPUT_EXCEEDED};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut backoff = ConstantBackOff::new(Duration::from_millis(1));
/// let mut failures = 2;
///
/// let written = Retry::new(&mut backoff)
///     .operation("put")
///     .notify(|err: &StoreError, delay: Duration| {
///         println!("retrying in {delay:?}: {err}");
///     })
///     .run(
///         |item: &str| {
///             let result = if failures > 0 {
///                 failures -= 1;
///                 Err(StoreError::service(THROUGHPUT_EXCEEDED, "rate exceeded"))
///             } else {
///                 Ok(item.len())
///             };
///             std::future::ready(result)
///         },
///         "item-1",
///     )
///     .await;
///
/// assert_eq!(written, Ok(6));
/// # }
/// ```
pub struct Retry<'a, B: ?Sized, C = StoreClassifier, N = Silent> {
    backoff: &'a mut B,
    classifier: C,
    notify: N,
    scope: CancelScope,
    operation: &'static str,
}

impl<'a, B> Retry<'a, B>
where
    B: BackOff + ?Sized,
{
    /// Start a session driven by `backoff`
    ///
    /// Defaults: [`StoreClassifier`], no observer, never cancelled.
    pub fn new(backoff: &'a mut B) -> Self {
        Self {
            backoff,
            classifier: StoreClassifier,
            notify: Silent,
            scope: CancelScope::never(),
            operation: "write",
        }
    }
}

impl<'a, B, C, N> Retry<'a, B, C, N>
where
    B: BackOff + ?Sized,
{
    /// Replace the classifier deciding which errors are retried
    pub fn classify_with<C2>(self, classifier: C2) -> Retry<'a, B, C2, N> {
        Retry {
            backoff: self.backoff,
            classifier,
            notify: self.notify,
            scope: self.scope,
            operation: self.operation,
        }
    }

    /// Add an observer invoked before each wait
    ///
    /// The observer receives the error that triggered the retry and the delay
    /// that is about to be awaited. It is not called when the session gives up.
    pub fn notify<N2>(self, notify: N2) -> Retry<'a, B, C, N2> {
        Retry {
            backoff: self.backoff,
            classifier: self.classifier,
            notify,
            scope: self.scope,
            operation: self.operation,
        }
    }

    /// Interrupt inter-attempt waits when `scope` fires
    pub fn cancel_on(mut self, scope: impl Into<CancelScope>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Label recorded on the session's tracing span
    pub fn operation(mut self, operation: &'static str) -> Self {
        self.operation = operation;
        self
    }

    /// Run the session, returning the operation's output or its last error
    ///
    /// The error is exactly what the last attempt produced, whichever way the
    /// session ended.
    pub async fn run<I, O, E, F, Fut>(self, call: F, input: I) -> Result<O, E>
    where
        I: Clone,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        C: Classify<E>,
        N: Notify<E>,
    {
        self.run_detailed(call, input)
            .await
            .map(RetryOutcome::into_inner)
            .map_err(RetryError::into_inner)
    }

    /// Run the session, tagging the result with how it ended
    pub async fn run_detailed<I, O, E, F, Fut>(
        self,
        call: F,
        input: I,
    ) -> Result<RetryOutcome<O>, RetryError<E>>
    where
        I: Clone,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        C: Classify<E>,
        N: Notify<E>,
    {
        let span = tracing::debug_span!("retry", operation = self.operation);
        self.session(call, input).instrument(span).await
    }

    async fn session<I, O, E, F, Fut>(
        self,
        mut call: F,
        input: I,
    ) -> Result<RetryOutcome<O>, RetryError<E>>
    where
        I: Clone,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        C: Classify<E>,
        N: Notify<E>,
    {
        let Retry {
            backoff,
            classifier,
            mut notify,
            scope,
            ..
        } = self;

        backoff.reset();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);

            let error = match call(input.clone()).await {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::trace!(attempts, "retry succeeded");
                    }
                    return Ok(RetryOutcome::new(value, attempts));
                }
                Err(error) => error,
            };

            if classifier.classify(&error) == Classification::Terminal {
                tracing::debug!(attempts, "non-retryable failure");
                return Err(RetryError::Terminal { error, attempts });
            }

            let Some(delay) = backoff.next_backoff() else {
                tracing::debug!(attempts, "backoff policy stopped, giving up");
                return Err(RetryError::Exhausted { error, attempts });
            };

            notify.notify(&error, delay);
            tracing::trace!(attempts, ?delay, "waiting before next attempt");

            if wait(delay, &scope).await == WaitOutcome::Cancelled {
                tracing::debug!(attempts, "cancelled while waiting to retry");
                return Err(RetryError::Cancelled { error, attempts });
            }
        }
    }
}

/// Retry a store write with the default classifier and no observer
pub async fn retry<I, O, E, F, Fut, B>(call: F, input: I, backoff: &mut B) -> Result<O, E>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: ServiceCode + fmt::Display,
    B: BackOff + ?Sized,
{
    Retry::new(backoff).run(call, input).await
}

/// Retry a store write, calling `notify` before each wait
pub async fn retry_notify<I, O, E, F, Fut, B, N>(
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
    Retry::new(backoff).notify(notify).run(call, input).await
}

/// Like [`retry_notify`], with waits interrupted when `scope` fires
pub async fn retry_notify_until<I, O, E, F, Fut, B, N>(
    call: F,
    input: I,
    backoff: &mut B,
    notify: N,
    scope: impl Into<CancelScope>,
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
        .notify(notify)
        .cancel_on(scope)
        .run(call, input)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{ConstantBackOff, ScheduledBackOff, WithMaxRetries, ZeroBackOff};
    use crate::cancel::CancellationToken;
    use crate::classify::{INTERNAL_SERVER_ERROR, THROUGHPUT_EXCEEDED};
    use crate::store::StoreError;
    use core::cell::{Cell, RefCell};
    use tokio::time::Instant;

    fn throttled(message: &str) -> StoreError {
        StoreError::service(THROUGHPUT_EXCEEDED, message)
    }

    fn invalid() -> StoreError {
        StoreError::service("ValidationException", "missing key attribute")
    }

    /// Counts calls into the wrapped policy.
    struct Spy<B> {
        inner: B,
        resets: u32,
        next_calls: u32,
    }

    impl<B> Spy<B> {
        fn new(inner: B) -> Self {
            Self {
                inner,
                resets: 0,
                next_calls: 0,
            }
        }
    }

    impl<B: BackOff> BackOff for Spy<B> {
        fn next_backoff(&mut self) -> Option<Duration> {
            self.next_calls += 1;
            self.inner.next_backoff()
        }

        fn reset(&mut self) {
            self.resets += 1;
            self.inner.reset();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let mut backoff = Spy::new(ConstantBackOff::new(Duration::from_secs(1)));
        let outcome = Retry::new(&mut backoff)
            .run_detailed(|n: u32| async move { Ok::<_, StoreError>(n + 1) }, 41)
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.into_inner(), 42);
        assert_eq!(backoff.resets, 1);
        assert_eq!(backoff.next_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_fails_fast() {
        let calls = Cell::new(0);
        let mut backoff = Spy::new(ConstantBackOff::new(Duration::from_millis(10)));
        let mut notified = 0;

        let result = Retry::new(&mut backoff)
            .notify(|_: &StoreError, _: Duration| notified += 1)
            .run_detailed(
                |_: ()| {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(invalid()) }
                },
                (),
            )
            .await;

        assert_eq!(
            result,
            Err(RetryError::Terminal {
                error: invalid(),
                attempts: 1
            })
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(backoff.next_calls, 0);
        assert_eq!(notified, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstructured_error_fails_fast() {
        let calls = Cell::new(0);
        let mut backoff = ZeroBackOff;

        let result = retry(
            |_: ()| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(StoreError::Unstructured("socket closed".into())) }
            },
            (),
            &mut backoff,
        )
        .await;

        assert_eq!(
            result,
            Err(StoreError::Unstructured("socket closed".into()))
        );
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        const FAILURES: u32 = 3;
        let calls = Cell::new(0u32);
        let mut backoff = ConstantBackOff::new(Duration::from_millis(5));
        let mut notified = 0;

        let result = Retry::new(&mut backoff)
            .notify(|_: &StoreError, _: Duration| notified += 1)
            .run_detailed(
                |item: &'static str| {
                    let n = calls.get() + 1;
                    calls.set(n);
                    async move {
                        if n <= FAILURES {
                            Err(throttled("rate exceeded"))
                        } else {
                            Ok(item.to_uppercase())
                        }
                    }
                },
                "item",
            )
            .await
            .unwrap();

        assert_eq!(result.value(), "ITEM");
        assert_eq!(result.attempts(), FAILURES + 1);
        assert_eq!(calls.get(), FAILURES + 1);
        assert_eq!(notified, FAILURES);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_fault_is_retried() {
        let calls = Cell::new(0u32);
        let mut backoff = ZeroBackOff;

        let result = retry(
            |_: ()| {
                let n = calls.get() + 1;
                calls.set(n);
                async move {
                    if n == 1 {
                        Err(StoreError::service(INTERNAL_SERVER_ERROR, "blip"))
                    } else {
                        Ok(n)
                    }
                }
            },
            (),
            &mut backoff,
        )
        .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Cell::new(0u32);
        let mut backoff = Spy::new(ScheduledBackOff::from_millis([10, 20, 30]));
        let start = Instant::now();

        let result = Retry::new(&mut backoff)
            .run_detailed(
                |_: ()| {
                    let n = calls.get() + 1;
                    calls.set(n);
                    async move { Err::<(), _>(throttled(&format!("attempt {n}"))) }
                },
                (),
            )
            .await;

        let elapsed = start.elapsed();
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                error: throttled("attempt 4"),
                attempts: 4
            })
        );
        assert_eq!(calls.get(), 4);
        assert_eq!(backoff.next_calls, 4);
        assert_eq!(backoff.resets, 1);
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let calls = Cell::new(0u32);
        let token = CancellationToken::new();
        let mut backoff = ConstantBackOff::new(Duration::from_secs(10));

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = Retry::new(&mut backoff)
            .cancel_on(&token)
            .run_detailed(
                |_: ()| {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(throttled("rate exceeded")) }
                },
                (),
            )
            .await;

        let elapsed = start.elapsed();
        assert!(result.as_ref().is_err_and(RetryError::is_cancelled));
        assert_eq!(result.unwrap_err().into_inner(), throttled("rate exceeded"));
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(10));

        // The abandoned wait must not lead to another attempt later on.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_delay_interrupted_by_deadline() {
        let mut backoff = Spy::new(ConstantBackOff::new(Duration::MAX));
        let mut notified = Vec::new();

        let result = Retry::new(&mut backoff)
            .cancel_on(CancelScope::never().with_timeout(Duration::from_millis(5)))
            .notify(|_: &StoreError, delay: Duration| notified.push(delay))
            .run_detailed(
                |_: ()| async { Err::<(), _>(throttled("rate exceeded")) },
                (),
            )
            .await;

        assert!(result.is_err_and(|e| e.is_cancelled() && e.attempts() == 1));
        assert_eq!(notified, vec![Duration::MAX]);
        assert_eq!(backoff.resets, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_several_attempts() {
        let calls = Cell::new(0u32);
        let scope = CancelScope::never().with_timeout(Duration::from_millis(25));
        let mut backoff = ConstantBackOff::new(Duration::from_millis(10));

        let result = Retry::new(&mut backoff)
            .cancel_on(scope)
            .run_detailed(
                |_: ()| {
                    let n = calls.get() + 1;
                    calls.set(n);
                    async move { Err::<(), _>(throttled(&format!("attempt {n}"))) }
                },
                (),
            )
            .await;

        // Attempts at 0ms, 10ms and 20ms; the deadline lands during the third wait.
        assert_eq!(
            result,
            Err(RetryError::Cancelled {
                error: throttled("attempt 3"),
                attempts: 3
            })
        );
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_attempt_still_runs_it() {
        let calls = Cell::new(0u32);
        let scope = CancelScope::never();
        scope.cancel();

        let mut backoff = ConstantBackOff::new(Duration::from_millis(10));
        let ok = Retry::new(&mut backoff)
            .cancel_on(scope.clone())
            .run(
                |_: ()| {
                    calls.set(calls.get() + 1);
                    async { Ok::<_, StoreError>("done") }
                },
                (),
            )
            .await;
        assert_eq!(ok, Ok("done"));
        assert_eq!(calls.get(), 1);

        let mut notified = Vec::new();
        let failed = Retry::new(&mut backoff)
            .cancel_on(scope)
            .notify(|err: &StoreError, delay: Duration| notified.push((err.clone(), delay)))
            .run_detailed(
                |_: ()| {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(throttled("rate exceeded")) }
                },
                (),
            )
            .await;
        assert!(failed.is_err_and(|e| e.is_cancelled() && e.attempts() == 1));
        assert_eq!(calls.get(), 2);
        assert_eq!(
            notified,
            vec![(throttled("rate exceeded"), Duration::from_millis(10))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_start_from_reset_state() {
        let mut backoff = ScheduledBackOff::from_millis([3, 6, 9]);

        async fn session(backoff: &mut ScheduledBackOff) -> Vec<Duration> {
            let mut delays = Vec::new();
            let _ = retry_notify(
                |_: ()| async { Err::<(), _>(throttled("rate exceeded")) },
                (),
                backoff,
                |_: &StoreError, delay: Duration| delays.push(delay),
            )
            .await;
            delays
        }

        let first = session(&mut backoff).await;
        let second = session(&mut backoff).await;
        assert_eq!(
            first,
            vec![
                Duration::from_millis(3),
                Duration::from_millis(6),
                Duration::from_millis(9),
            ]
        );
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_payload_matches_attempts_and_waits() {
        let attempt_times = RefCell::new(Vec::new());
        let mut backoff = ScheduledBackOff::from_millis([10, 20, 40]);
        let mut notified = Vec::new();

        let result = retry_notify(
            |input: u32| {
                let mut times = attempt_times.borrow_mut();
                times.push(Instant::now());
                let n = times.len();
                async move {
                    match n {
                        1 => Err(throttled("throttled")),
                        2 => Err(throttled("throttled again")),
                        _ => Ok(input),
                    }
                }
            },
            7u32,
            &mut backoff,
            |err: &StoreError, delay: Duration| notified.push((err.clone(), delay)),
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(
            notified,
            vec![
                (throttled("throttled"), Duration::from_millis(10)),
                (throttled("throttled again"), Duration::from_millis(20)),
            ]
        );

        let times = attempt_times.into_inner();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(10));
        assert!(times[1] - times[0] < Duration::from_millis(20));
        assert!(times[2] - times[1] >= Duration::from_millis(20));
        assert!(times[2] - times[1] < Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_retries() {
        let calls = Cell::new(0u32);
        let mut backoff = WithMaxRetries::new(ZeroBackOff, 5);

        let result = retry(
            |_: ()| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(throttled("rate exceeded")) }
            },
            (),
            &mut backoff,
        )
        .await;

        assert_eq!(result, Err(throttled("rate exceeded")));
        assert_eq!(calls.get(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier() {
        #[derive(Debug, PartialEq)]
        enum ApiError {
            Busy,
            Gone,
        }

        let calls = Cell::new(0u32);
        let mut backoff = ZeroBackOff;

        let result = Retry::new(&mut backoff)
            .classify_with(|e: &ApiError| match e {
                ApiError::Busy => Classification::Retryable,
                ApiError::Gone => Classification::Terminal,
            })
            .run(
                |_: ()| {
                    let n = calls.get() + 1;
                    calls.set(n);
                    async move {
                        if n < 3 {
                            Err::<(), _>(ApiError::Busy)
                        } else {
                            Err(ApiError::Gone)
                        }
                    }
                },
                (),
            )
            .await;

        assert_eq!(result, Err(ApiError::Gone));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_operation_via_ready() {
        fn put_item(key: String) -> Result<String, StoreError> {
            if key.is_empty() {
                Err(invalid())
            } else {
                Ok(format!("stored {key}"))
            }
        }

        let mut backoff = ZeroBackOff;
        let stored = retry(
            |key: String| std::future::ready(put_item(key)),
            "user#1".to_string(),
            &mut backoff,
        )
        .await;
        assert_eq!(stored, Ok("stored user#1".to_string()));

        let rejected = retry(
            |key: String| std::future::ready(put_item(key)),
            String::new(),
            &mut backoff,
        )
        .await;
        assert_eq!(rejected, Err(invalid()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_notify_until_deadline() {
        let mut backoff = ConstantBackOff::new(Duration::from_secs(5));
        let mut notified = 0;
        let start = Instant::now();

        let result = retry_notify_until(
            |_: ()| async { Err::<(), _>(throttled("rate exceeded")) },
            (),
            &mut backoff,
            |_: &StoreError, _: Duration| notified += 1,
            CancelScope::never().with_timeout(Duration::from_secs(1)),
        )
        .await;

        assert_eq!(result, Err(throttled("rate exceeded")));
        assert_eq!(notified, 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}

//! Backoff policies consumed by the retry executor
//!
//! A [`BackOff`] is a small piece of per-session state: it hands out the delay
//! before the next attempt, or `None` once the session should give up. The
//! executor calls [`BackOff::reset`] once at the start of every session, so a
//! single instance can be reused for sequential sessions but never shared by
//! two sessions running at the same time.

use std::time::Duration;

/// Stateful generator of successive wait durations for one retry session
pub trait BackOff {
    /// Produce the delay before the next attempt
    ///
    /// # Returns
    ///
    /// `Some(delay)` to retry after `delay` (which may be zero), or `None`
    /// when no further retries should happen.
    fn next_backoff(&mut self) -> Option<Duration>;

    /// Return the policy to its first-attempt state
    fn reset(&mut self);
}

impl<B: BackOff + ?Sized> BackOff for &mut B {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

impl<B: BackOff + ?Sized> BackOff for Box<B> {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Fixed delay between every attempt, never stops on its own
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use store_retry::{BackOff, ConstantBackOff};
///
/// let mut backoff = ConstantBackOff::new(Duration::from_millis(50));
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(50)));
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(50)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBackOff {
    /// Delay handed out for every retry
    pub interval: Duration,
}

impl ConstantBackOff {
    /// Create a constant policy with the given interval
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for ConstantBackOff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackOff for ConstantBackOff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.interval)
    }

    fn reset(&mut self) {}
}

/// Retry immediately, forever
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZeroBackOff;

impl BackOff for ZeroBackOff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    fn reset(&mut self) {}
}

/// Never retry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopBackOff;

impl BackOff for StopBackOff {
    fn next_backoff(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}

/// Explicit list of delays, handed out in order, then stop
///
/// Useful when a caller (or a test) wants a fully predictable schedule.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use store_retry::{BackOff, ScheduledBackOff};
///
/// let mut backoff = ScheduledBackOff::from_millis([10, 20]);
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(20)));
/// assert_eq!(backoff.next_backoff(), None);
///
/// backoff.reset();
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduledBackOff {
    schedule: Vec<Duration>,
    cursor: usize,
}

impl ScheduledBackOff {
    /// Create a policy that yields `schedule` in order
    pub fn new(schedule: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            schedule: schedule.into_iter().collect(),
            cursor: 0,
        }
    }

    /// Create a policy from delays expressed in milliseconds
    pub fn from_millis(schedule: impl IntoIterator<Item = u64>) -> Self {
        Self::new(schedule.into_iter().map(Duration::from_millis))
    }

    /// Delays not yet handed out in the current session
    pub fn remaining(&self) -> &[Duration] {
        &self.schedule[self.cursor..]
    }
}

impl BackOff for ScheduledBackOff {
    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.schedule.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(delay)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Caps the number of delays an inner policy may hand out
///
/// After `max_retries` delays the wrapper answers `None` regardless of the
/// inner policy. Resetting the wrapper resets the inner policy too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithMaxRetries<B> {
    inner: B,
    max_retries: u32,
    retries: u32,
}

impl<B: BackOff> WithMaxRetries<B> {
    /// Wrap `inner`, allowing at most `max_retries` retries per session
    pub fn new(inner: B, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            retries: 0,
        }
    }

    /// Maximum number of retries per session
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Borrow the wrapped policy
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Unwrap the inner policy
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: BackOff> BackOff for WithMaxRetries<B> {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        self.inner.next_backoff()
    }

    fn reset(&mut self) {
        self.retries = 0;
        self.inner.reset();
    }
}

/// Backoff policy that can represent any of the bundled strategies.
///
/// The enum form makes it possible to store heterogeneous policies in a
/// registry or configuration and still hand each session its own instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOffPolicy {
    /// Fixed delay
    Constant(ConstantBackOff),
    /// Immediate retry
    Zero(ZeroBackOff),
    /// No retry at all
    Stop(StopBackOff),
    /// Explicit delay list
    Scheduled(ScheduledBackOff),
    /// Another policy with a retry cap
    Limited(Box<WithMaxRetries<BackOffPolicy>>),
}

impl BackOffPolicy {
    /// Wrap this policy so it stops after `max_retries` retries
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        BackOffPolicy::Limited(Box::new(WithMaxRetries::new(self, max_retries)))
    }
}

impl BackOff for BackOffPolicy {
    fn next_backoff(&mut self) -> Option<Duration> {
        match self {
            BackOffPolicy::Constant(policy) => policy.next_backoff(),
            BackOffPolicy::Zero(policy) => policy.next_backoff(),
            BackOffPolicy::Stop(policy) => policy.next_backoff(),
            BackOffPolicy::Scheduled(policy) => policy.next_backoff(),
            BackOffPolicy::Limited(policy) => policy.next_backoff(),
        }
    }

    fn reset(&mut self) {
        match self {
            BackOffPolicy::Constant(policy) => policy.reset(),
            BackOffPolicy::Zero(policy) => policy.reset(),
            BackOffPolicy::Stop(policy) => policy.reset(),
            BackOffPolicy::Scheduled(policy) => policy.reset(),
            BackOffPolicy::Limited(policy) => policy.reset(),
        }
    }
}

impl From<ConstantBackOff> for BackOffPolicy {
    fn from(value: ConstantBackOff) -> Self {
        BackOffPolicy::Constant(value)
    }
}

impl From<ZeroBackOff> for BackOffPolicy {
    fn from(value: ZeroBackOff) -> Self {
        BackOffPolicy::Zero(value)
    }
}

impl From<StopBackOff> for BackOffPolicy {
    fn from(value: StopBackOff) -> Self {
        BackOffPolicy::Stop(value)
    }
}

impl From<ScheduledBackOff> for BackOffPolicy {
    fn from(value: ScheduledBackOff) -> Self {
        BackOffPolicy::Scheduled(value)
    }
}

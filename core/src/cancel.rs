//! Cancellation scope observed by the executor between attempts.
//!
//! A [`CancelScope`] fires when its token is cancelled (directly or through a
//! parent token) or when its optional deadline passes. The executor only reads
//! it; cancelling is always the caller's decision.

use std::time::Duration;

use tokio::time::Instant;
pub use tokio_util::sync::CancellationToken;

/// Read-mostly handle the executor races its inter-attempt waits against.
///
/// Cloning is cheap and every clone observes the same signal.
///
/// # Example
///
/// ```rust
/// use store_retry::{CancelScope, CancellationToken};
///
/// let parent = CancellationToken::new();
/// let scope = CancelScope::from(parent.clone());
/// let child = scope.child();
///
/// parent.cancel();
/// assert!(scope.is_cancelled());
/// assert!(child.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// Scope that never fires unless [`cancel`](Self::cancel) is called on it
    pub fn never() -> Self {
        Self::default()
    }

    /// Scope driven by an existing token
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Also fire once `deadline` is reached
    ///
    /// If a deadline is already set, the earlier of the two wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Also fire once `timeout` has elapsed from now
    ///
    /// A timeout too large to represent as an instant sets no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Scope cancelled together with this one, but cancellable on its own
    /// without affecting the parent. The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Underlying token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the scope has already fired, without blocking
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the scope fires.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl From<CancellationToken> for CancelScope {
    fn from(token: CancellationToken) -> Self {
        Self::new(token)
    }
}

impl From<&CancellationToken> for CancelScope {
    fn from(token: &CancellationToken) -> Self {
        Self::new(token.clone())
    }
}

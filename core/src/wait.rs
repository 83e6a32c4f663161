//! Inter-attempt wait, raced against cancellation.

use std::time::Duration;

use crate::cancel::CancelScope;

/// How an inter-attempt wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full delay elapsed
    Elapsed,
    /// The scope fired first
    Cancelled,
}

/// Wait for `delay` unless `scope` fires first.
///
/// Cancellation is polled first, so a scope that has already fired wins even
/// against a zero delay. Whichever branch loses is dropped before returning,
/// which deregisters the pending timer.
pub async fn wait(delay: Duration, scope: &CancelScope) -> WaitOutcome {
    let timer = tokio::time::sleep(delay);
    tokio::select! {
        biased;
        () = scope.cancelled() => WaitOutcome::Cancelled,
        () = timer => WaitOutcome::Elapsed,
    }
}

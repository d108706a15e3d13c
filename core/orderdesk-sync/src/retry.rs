//! Deadline and retry wrappers for remote operations.
//!
//! Every remote call is raced against a deadline and retried with a linear
//! backoff up to a fixed attempt budget. The store protocol has no
//! cancellation, so an expired deadline stops the wait, not the request:
//! the call settles (or not) in the background.

use crate::error::{Operation, SyncError, SyncResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Deadline for single-record reads and writes.
pub const RECORD_DEADLINE: Duration = Duration::from_secs(15);

/// Deadline for compound operations: order and payment mutations, and
/// full-collection fetches.
pub const OP_DEADLINE: Duration = Duration::from_secs(60);

/// Races `future` against `after`. The timer firing first fails the call
/// with a [`SyncError::Timeout`] carrying the operation name.
pub async fn deadline<T>(
    operation: &'static str,
    after: Duration,
    future: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout { operation, after }),
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try.
    pub max_attempts: u32,
    /// Base backoff unit; the wait after failed attempt `n` is `n` times
    /// this.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and the standard
    /// 2-second backoff unit.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(2),
        }
    }

    /// Creates a single-attempt policy.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Sets the base backoff unit.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// The wait before retrying after the given 1-indexed failed attempt:
    /// linear backoff (1x, 2x, ... the base delay).
    #[must_use]
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs `f` up to the policy's attempt budget, waiting the linear backoff
/// between failures. Attempt errors are treated uniformly, whatever their
/// kind; exhaustion wraps the last error tagged with `operation`.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: Operation,
    mut f: F,
) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.delay_after_attempt(attempt - 1)).await;
        }
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                warn!(
                    %operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    %error,
                    "attempt failed"
                );
                last_error = Some(error);
            }
        }
    }
    Err(SyncError::exhausted(
        operation,
        policy.max_attempts,
        last_error.unwrap_or_else(|| SyncError::Remote("no attempts were made".into())),
    ))
}

//! Bounded polling for operation finality.
//!
//! Receipt, bundler, and intent polling share one loop so that every backend
//! gives up the same way: with [`WalletError::Timeout`] naming the handle.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::WalletError;

/// Retry bound for polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between polls.
    pub interval: Duration,
    /// Number of polls before giving up.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollPolicy {
    /// One poll per second for two minutes.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 120)
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// The operation reached a terminal state.
    Ready(T),
    /// Not there yet.
    Pending,
}

/// Call `check` until it yields [`Poll::Ready`] or the policy is exhausted.
///
/// Errors returned by `check` abort the loop immediately.
///
/// # Errors
///
/// Returns [`WalletError::Timeout`] after `max_attempts` pending polls, or the
/// first error returned by `check`.
pub async fn poll_until<T, F, Fut>(
    handle: &str,
    policy: PollPolicy,
    mut check: F,
) -> Result<T, WalletError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, WalletError>>,
{
    for attempt in 1..=policy.max_attempts {
        if let Poll::Ready(value) = check().await? {
            return Ok(value);
        }
        debug!(handle, attempt, "operation pending");
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(WalletError::Timeout {
        handle: handle.to_owned(),
        attempts: policy.max_attempts,
    })
}

//! Retry policy for the remote call boundary.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{MtError, MtResult};

/// Fixed-delay retry with a bounded number of attempts.
///
/// Only errors for which [`MtError::is_retryable`] holds are retried; any
/// other error is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// No waiting between attempts, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn should_retry(&self, err: &MtError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_retryable()
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> MtResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MtResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "{what} failed, retrying"
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

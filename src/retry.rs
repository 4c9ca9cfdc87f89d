//! Retry and polling policies
//!
//! Backoff state lives in an explicit policy value instead of being local to
//! each network call, so callers can tune and test it.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::BtcSwapError;

/// Exponential backoff without a cap. Retrying stops only when the
/// cancellation token fires.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub growth_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            growth_factor: 1.6,
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_interval: Duration, growth_factor: f64) -> Self {
        Self {
            initial_interval,
            growth_factor,
        }
    }

    /// Interval to wait before the retry that follows `interval`
    pub fn next_interval(&self, interval: Duration) -> Duration {
        interval.mul_f64(self.growth_factor.max(1.0))
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// `cancel` fires (which yields [`BtcSwapError::TimedOut`]).
    ///
    /// Cancellation is checked before every attempt and while waiting between
    /// attempts, never during an in-flight call.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        what: &str,
        mut op: F,
    ) -> Result<T, BtcSwapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BtcSwapError>>,
    {
        let mut interval = self.initial_interval;
        loop {
            if cancel.is_cancelled() {
                return Err(BtcSwapError::TimedOut);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    log::warn!(
                        "{} failed: {}, will try again in {:?}",
                        what,
                        e,
                        interval
                    );
                    if !sleep_or_cancel(cancel, interval).await {
                        return Err(BtcSwapError::TimedOut);
                    }
                    interval = self.next_interval(interval);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fixed-interval polling budget for postconditions
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            attempts: 60,
        }
    }
}

/// Sleep for `duration`. Returns false if `cancel` fired first.
pub(crate) async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

//! Retry with exponential backoff for transient index failures.

use std::future::Future;
use std::time::Duration;

use qou_config::RetryConfig;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::IndexError;

/// How many times to attempt a request and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` counts the first attempt and is at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Builds the policy from the `[retry]` configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Total attempts per request.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `attempt` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `attempt` receives the 1-based attempt number. Cancellation during a
    /// backoff sleep ends the loop with [`IndexError::Cancelled`].
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, IndexError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, IndexError>>,
    {
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && n < self.max_attempts => {
                    let delay = self.backoff(n);
                    warn!(
                        operation,
                        attempt = n,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient index failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(IndexError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    n += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

//! Bounded retry with per-attempt timeout and exponential backoff

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::error::{Error, Result};

/// How long one collaborator call may take and how often it is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Limit for a single attempt
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `operation`, retrying only errors that report `is_retryable()`
    ///
    /// An attempt that exceeds `timeout` is abandoned and counts as a
    /// retryable failure. `label` names the call in logs and timeout errors.
    pub async fn run<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_retries + 1;
        let mut attempt = 0;

        loop {
            let outcome = match timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} timed out after {:?}",
                    label, self.timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label,
                        attempt + 1,
                        attempts,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

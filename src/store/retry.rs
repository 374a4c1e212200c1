use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreError;

/// How a store call is repeated after a failure.
///
/// Delay before retry `n` (1-based) is `base_delay * n`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retryable: fn(&StoreError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            retryable: StoreError::is_transient,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `operation`, retrying while the error is retryable and attempts remain
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && (self.retryable)(&err) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

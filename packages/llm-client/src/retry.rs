//! Exponential-backoff retry for chat-completion calls.
//!
//! Ported from the retry manager used elsewhere in this codebase for
//! model-provider calls, tightened to the fixed schedule spec.md §4.6
//! requires: 1 s initial delay, factor 2, 10 s cap, at most 3 retries.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

pub struct RetryManager {
    config: RetryConfig,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryManager {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds, exhausts retries, or fails with
    /// a non-retriable error.
    pub async fn retry<F, T, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempt = 0;
        let mut delay = self.config.initial_delay;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    attempt += 1;

                    if !error.is_retriable() {
                        return Err(error);
                    }
                    if attempt > self.config.max_retries {
                        warn!(operation = operation_name, attempts = attempt, "retries exhausted");
                        return Err(error);
                    }

                    warn!(operation = operation_name, attempt, delay = ?delay, error = %error, "retrying after transient failure");
                    sleep(delay).await;
                    delay = self.next_delay(delay);
                }
            }
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.config.backoff_multiplier) as u64;
        Duration::from_millis(next_ms).min(self.config.max_delay)
    }
}

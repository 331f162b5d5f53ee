//! Retry with exponential backoff for external calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::BackendError;
use crate::config::RetryConfig;

/// How often, and how patiently, a backend call is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

/// Every attempt failed, or a permanent error stopped the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            multiplier: config.multiplier,
            max_backoff: config.max_backoff(),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `call` until it succeeds, fails permanently, runs out of attempts
    /// or would overrun `deadline`.
    ///
    /// `call` receives the 1-based attempt number. Each attempt is bounded by
    /// the per-attempt timeout (and by the deadline, whichever is sooner); a
    /// timed-out attempt counts as a transient failure.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        deadline: Option<Instant>,
        mut call: F,
    ) -> Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut budget = self.attempt_timeout;
            if let Some(deadline) = deadline {
                budget = budget.min(deadline.saturating_duration_since(Instant::now()));
            }

            let error = match time::timeout(budget, call(attempt)).await {
                Ok(Ok(value)) => {
                    debug!(operation, attempt, "Backend call succeeded");
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_) => BackendError::Transient(format!(
                    "attempt timed out after {} ms",
                    budget.as_millis()
                )),
            };

            if !error.is_transient() {
                warn!(operation, attempt, error = %error, "Permanent backend failure");
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }
            if attempt >= self.max_attempts {
                warn!(operation, attempt, error = %error, "Retries exhausted");
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = self.backoff(attempt);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    warn!(operation, attempt, error = %error, "Deadline reached before next retry");
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: format!("{} (deadline reached)", error),
                    });
                }
            }

            warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient backend failure, retrying"
            );
            time::sleep(delay).await;
        }
    }
}

//! Retry executor: per-attempt timeout, error classification, and
//! exponential backoff with jitter around a single idempotent network call.
//!
//! Every attempt — including retries — first acquires a [`RateLimiter`]
//! slot, so retries count against the same outbound budget as fresh
//! requests. Only errors that report [`FetchError::is_retryable`] are
//! retried; everything else is returned to the caller unmodified.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::limiter::RateLimiter;

/// Retry/backoff tuning.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts (first try plus retries).
    pub max_attempts: u32,
    /// Base backoff delay.
    pub initial_delay: Duration,
    /// Backoff ceiling, applied after jitter.
    pub max_delay: Duration,
    /// Hard deadline per attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Extract the retry knobs from a pipeline config.
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Wraps network calls with rate limiting, timeout, and backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor that draws slots from `limiter`.
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    /// Run `operation` until it succeeds, fails permanently, or retries
    /// are exhausted.
    ///
    /// Timeouts and retryable errors trigger backoff and another attempt;
    /// non-retryable errors are returned unmodified after the first
    /// occurrence. Exhaustion yields [`FetchError::RetriesExhausted`]
    /// carrying the final cause and the attempt count.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout_ms = self.policy.attempt_timeout.as_millis() as u64;
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt - 1);
                tracing::debug!(attempt, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            self.limiter.acquire().await?;

            match tokio::time::timeout(self.policy.attempt_timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if err.is_retryable() => {
                    tracing::warn!(attempt, error = %err, "attempt failed, will retry");
                    last_err = Some(err);
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    tracing::warn!(attempt, timeout_ms, "attempt timed out");
                    last_err = Some(FetchError::Timeout(timeout_ms));
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last: Box::new(last_err.unwrap_or_else(|| {
                FetchError::Config("retry_max_attempts must be greater than 0".into())
            })),
        })
    }

    /// Backoff for the given 0-based attempt index:
    /// `min(max_delay, initial * 2^attempt * jitter)`, jitter uniform in
    /// `[0.5, 1.0]`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.policy.initial_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(20));
        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        let jittered_ms = (exp_ms as f64 * jitter) as u64;
        Duration::from_millis(jittered_ms.min(self.policy.max_delay.as_millis() as u64))
    }
}

//! Create-call retry policy.
//!
//! A bounded number of attempts, retrying only retryable conditions. Backoff
//! grows per attempt; the rate-limit case gets a longer, separately computed
//! delay. Non-retryable errors fail immediately without consuming further
//! attempts.

use crate::error::GenerationError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum create attempts (first try included).
    pub max_attempts: usize,
    /// Base backoff delay, doubled per attempt.
    pub base_delay: Duration,
    /// Delay used when the backend reports rate limiting, scaled by attempt.
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Backoff before the attempt after `attempt` (1-based) failed.
    pub fn delay_for(&self, attempt: usize, rate_limited: bool) -> Duration {
        if rate_limited {
            self.rate_limit_delay * attempt as u32
        } else {
            self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1) as u32)
        }
    }
}

/// Run `op` under the retry policy. `op` receives the 1-based attempt number
/// so callers can recompute per-attempt state such as auth headers.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, GenerationError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, err.is_rate_limited());
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Create attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(attempt, error = %err, "Create failed terminally");
                return Err(err);
            }
        }
    }
}

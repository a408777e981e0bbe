//! Bounded poll combinator.
//!
//! Repeats a probe at a fixed interval until it reports a terminal outcome or
//! the overall deadline passes. A transient probe failure (network error,
//! non-2xx poll response) is "not yet ready", not task failure: it counts only
//! against the wall-clock timeout. On expiry the remote task's fate is left
//! unknown; no cancellation is issued and any late result is discarded.

use crate::error::GenerationError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one poll probe.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// Task reached a successful terminal status.
    Ready(T),
    /// Task still running (or the probe itself transiently failed).
    Pending,
    /// Task reported a terminal failure; polling stops immediately.
    Failed(GenerationError),
}

/// Poll `probe` every `interval` until Ready/Failed, or until `timeout`
/// elapses overall.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollOutcome<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match probe().await {
            PollOutcome::Ready(value) => return Ok(value),
            PollOutcome::Failed(err) => return Err(err),
            PollOutcome::Pending => {}
        }

        if Instant::now() + interval > deadline {
            return Err(GenerationError::Timeout { waited: timeout });
        }
        tokio::time::sleep(interval).await;
    }
}

//! Error types for the Everloop video engine.

use std::time::Duration;
use thiserror::Error;

/// Playback-side errors surfaced by the continuity scheduler.
///
/// These never halt the scheduler loop; they are logged and the loop keeps
/// attempting swaps on subsequent ticks.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("clip set must contain exactly 3 clips, got {len}")]
    InvalidClipSet { len: usize },

    #[error("playback surface error: {0}")]
    Surface(String),

    #[error("scheduler is not running")]
    SchedulerStopped,
}

/// Generation-side errors produced by task clients and the orchestrator.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("backend rate limited: {0}")]
    RateLimited(String),

    #[error("generation task failed: {0}")]
    TaskFailed(String),

    #[error("generation timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("no video url in backend response")]
    MissingResult,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("frame set must contain exactly 4 frames, got {len}")]
    InvalidFrameSet { len: usize },

    #[error("clip {failed_index} failed, discarding set: {source}")]
    Partial {
        failed_index: usize,
        source: Box<GenerationError>,
    },
}

impl GenerationError {
    /// Whether a create attempt that produced this error may be retried.
    ///
    /// Transport failures, rate limiting, and transient server statuses are
    /// retryable; everything else fails the attempt budget immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Transport(_) | GenerationError::RateLimited(_) => true,
            GenerationError::Http { status, .. } => {
                matches!(status, 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Whether the error is the rate-limit case that earns the longer,
    /// separately computed backoff delay.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited(_))
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for GenerationError {
    fn from(err: config::ConfigError) -> Self {
        GenerationError::Config(err.to_string())
    }
}

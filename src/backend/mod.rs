//! Generation Backend Abstraction
//!
//! Unified interface over multiple asynchronous image-to-video backends
//! (Kling, Luma, fal). Each task client performs one create+poll round trip
//! against its backend, hiding the authentication scheme, endpoint shape,
//! and response format behind a single normalized result.

use crate::config::BackendConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod auth;
pub mod extract;
pub mod poll;
pub mod retry;

mod fal;
mod kling;
mod luma;

pub use fal::FalBackend;
pub use kling::KlingBackend;
pub use luma::LumaBackend;

/// The closed set of supported backends. Selection maps a configured name to
/// one variant at startup; dispatch is never ad hoc per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Kling,
    Luma,
    Fal,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Kling => "kling",
            BackendKind::Luma => "luma",
            BackendKind::Fal => "fal",
        }
    }

    /// Overall task timeout ceiling when the configuration does not override it.
    pub fn default_timeout(self) -> Duration {
        match self {
            BackendKind::Kling => Duration::from_secs(240),
            BackendKind::Luma => Duration::from_secs(180),
            BackendKind::Fal => Duration::from_secs(120),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kling" => Ok(BackendKind::Kling),
            "luma" => Ok(BackendKind::Luma),
            "fal" => Ok(BackendKind::Fal),
            other => Err(GenerationError::Config(format!(
                "unknown backend kind: {other}"
            ))),
        }
    }
}

/// One clip-generation request: animate from a start frame to an end frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    pub start_frame: String,
    pub end_frame: String,
    pub duration_secs: f64,
    pub prompt: Option<String>,
}

/// Normalized outcome of one task client invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub video_url: String,
}

/// One backend's create+poll generation protocol.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one create-task + poll-until-done round trip and return the
    /// normalized result, or a definitive failure.
    async fn generate_clip(&self, request: &ClipRequest)
        -> Result<GenerationResult, GenerationError>;

    /// Backend name, for logging and selection.
    fn name(&self) -> &str;
}

const BACKEND_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const BACKEND_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP client construction for all task clients. The per-request
/// timeout here bounds single create/poll calls; the overall task timeout is
/// enforced by the poll combinator.
pub(crate) fn build_backend_http_client() -> Result<Client, GenerationError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(BACKEND_HTTP_CONNECT_TIMEOUT)
        .timeout(BACKEND_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| GenerationError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Read a response body as JSON, mapping non-2xx statuses onto the error
/// taxonomy: 429 is the rate-limit case with its own longer backoff, other
/// statuses carry their code for retryability classification.
pub(crate) async fn read_json_response(
    response: reqwest::Response,
) -> Result<serde_json::Value, GenerationError> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("failed to parse response: {e}")))
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if status.as_u16() == 429 {
            Err(GenerationError::RateLimited(body))
        } else {
            Err(GenerationError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Backend factory for creating task clients from configuration.
pub struct BackendFactory;

impl BackendFactory {
    pub fn create(config: &BackendConfig) -> Result<Box<dyn GenerationBackend>, GenerationError> {
        config
            .validate()
            .map_err(GenerationError::Config)?;
        match config.kind {
            BackendKind::Kling => Ok(Box::new(KlingBackend::new(config)?)),
            BackendKind::Luma => Ok(Box::new(LumaBackend::new(config)?)),
            BackendKind::Fal => Ok(Box::new(FalBackend::new(config)?)),
        }
    }
}

// Mock backend for testing
#[cfg(test)]
pub(crate) struct MockBackend {
    outcomes: parking_lot::Mutex<
        std::collections::HashMap<String, Result<GenerationResult, GenerationError>>,
    >,
    calls: parking_lot::Mutex<Vec<ClipRequest>>,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(
        outcomes: std::collections::HashMap<String, Result<GenerationResult, GenerationError>>,
    ) -> Self {
        Self {
            outcomes: parking_lot::Mutex::new(outcomes),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ClipRequest> {
        self.calls.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate_clip(
        &self,
        request: &ClipRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.calls.lock().push(request.clone());
        self.outcomes
            .lock()
            .remove(&request.start_frame)
            .unwrap_or_else(|| {
                Ok(GenerationResult {
                    video_url: format!("https://cdn.example/{}.mp4", request.start_frame),
                })
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

//! Kling task client.
//!
//! Image-to-video via Kling's create/poll task protocol. Authentication uses a
//! short-lived signed token recomputed per create call; the poll loop reuses
//! the header captured at creation. Kling wraps everything in a
//! `{ code, message, data }` envelope where a non-zero code is terminal even
//! on HTTP 200.

use crate::backend::auth::AuthScheme;
use crate::backend::extract::{extract_video_url, pluck_string, ExtractionStrategy};
use crate::backend::poll::{poll_until, PollOutcome};
use crate::backend::retry::{with_retry, RetryPolicy};
use crate::backend::{
    build_backend_http_client, read_json_response, ClipRequest, GenerationBackend,
    GenerationResult,
};
use crate::config::BackendConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api-singapore.klingai.com";
const DEFAULT_MODEL: &str = "kling-v1-6";

/// Known result shapes, newest API version first. The deep scan inside
/// `extract_video_url` stays as the last resort for shapes we have not seen.
const RESULT_STRATEGIES: [ExtractionStrategy; 3] = [
    ExtractionStrategy {
        name: "data.task_result.videos[0].url",
        extract: |v| pluck_string(v, &["data", "task_result", "videos", "0", "url"]),
    },
    ExtractionStrategy {
        name: "data.works[0].resource.resource",
        extract: |v| pluck_string(v, &["data", "works", "0", "resource", "resource"]),
    },
    ExtractionStrategy {
        name: "data.video_url",
        extract: |v| pluck_string(v, &["data", "video_url"]),
    },
];

pub struct KlingBackend {
    client: Client,
    base_url: String,
    model: String,
    auth: AuthScheme,
    policy: RetryPolicy,
    poll_interval: Duration,
    timeout: Duration,
}

impl KlingBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, GenerationError> {
        let access_key = config
            .access_key
            .clone()
            .ok_or_else(|| GenerationError::Config("kling requires access_key".to_string()))?;
        let secret_key = config
            .secret_key
            .clone()
            .ok_or_else(|| GenerationError::Config("kling requires secret_key".to_string()))?;

        Ok(Self {
            client: build_backend_http_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            auth: AuthScheme::SignedToken {
                access_key,
                secret_key,
            },
            policy: RetryPolicy::with_max_attempts(config.max_create_attempts),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        })
    }

    /// Classify one poll response body.
    fn poll_outcome(value: &Value) -> PollOutcome<String> {
        match pluck_string(value, &["data", "task_status"]).as_deref() {
            Some("succeed") => match extract_video_url(value, &RESULT_STRATEGIES) {
                Some(url) => PollOutcome::Ready(url),
                None => PollOutcome::Failed(GenerationError::MissingResult),
            },
            Some("failed") => {
                let reason = pluck_string(value, &["data", "task_status_msg"])
                    .unwrap_or_else(|| "task failed".to_string());
                PollOutcome::Failed(GenerationError::TaskFailed(reason))
            }
            // submitted / processing / unknown states keep polling
            _ => PollOutcome::Pending,
        }
    }

    /// A non-zero envelope code is a terminal backend failure.
    fn check_envelope(value: &Value) -> Result<(), GenerationError> {
        match value.get("code").and_then(Value::as_i64) {
            Some(0) | None => Ok(()),
            Some(code) => {
                let message = pluck_string(value, &["message"])
                    .unwrap_or_else(|| "unknown error".to_string());
                Err(GenerationError::TaskFailed(format!(
                    "kling error {code}: {message}"
                )))
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for KlingBackend {
    async fn generate_clip(
        &self,
        request: &ClipRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let create_url = format!("{}/v1/videos/image2video", self.base_url);
        let body = json!({
            "model_name": self.model,
            "image": request.start_frame,
            "image_tail": request.end_frame,
            "duration": format!("{}", request.duration_secs.round() as u64),
            "prompt": request.prompt,
        });

        let (created, auth_header) = with_retry(&self.policy, |_| {
            // Signed tokens are short-lived; recompute per attempt.
            let header = self.auth.header_value();
            let body = body.clone();
            let create_url = create_url.clone();
            async move {
                let header = header?;
                let response = self
                    .client
                    .post(&create_url)
                    .header(AUTHORIZATION, &header)
                    .json(&body)
                    .send()
                    .await?;
                let value = read_json_response(response).await?;
                Ok((value, header))
            }
        })
        .await?;

        Self::check_envelope(&created)?;

        // Fast path: some responses carry the result directly.
        if let Some(url) = extract_video_url(&created, &RESULT_STRATEGIES) {
            return Ok(GenerationResult { video_url: url });
        }

        let task_id = pluck_string(&created, &["data", "task_id"])
            .or_else(|| pluck_string(&created, &["task_id"]))
            .ok_or(GenerationError::MissingResult)?;
        debug!(task_id = %task_id, "Created kling generation task");

        let poll_url = format!("{}/v1/videos/image2video/{}", self.base_url, task_id);
        let video_url = poll_until(self.poll_interval, self.timeout, || {
            let poll_url = poll_url.clone();
            let header = auth_header.clone();
            async move {
                let response = match self
                    .client
                    .get(&poll_url)
                    .header(AUTHORIZATION, &header)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(err) => {
                        debug!(error = %err, "Poll request failed, treating as pending");
                        return PollOutcome::Pending;
                    }
                };
                match read_json_response(response).await {
                    Ok(value) => Self::poll_outcome(&value),
                    Err(err) => {
                        debug!(error = %err, "Poll response unusable, treating as pending");
                        PollOutcome::Pending
                    }
                }
            }
        })
        .await?;

        Ok(GenerationResult { video_url })
    }

    fn name(&self) -> &str {
        "kling"
    }
}

//! fal queue task client.
//!
//! Static `Key` authentication. Create enqueues a request and returns a
//! request id plus status/response URLs; polling hits the status URL until
//! `COMPLETED`, then the result is fetched from the response URL in the same
//! probe.

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

const DEFAULT_BASE_URL: &str = "https://queue.fal.run";
const DEFAULT_MODEL: &str = "fal-ai/kling-video/v1.6/standard/image-to-video";

const RESULT_STRATEGIES: [ExtractionStrategy; 2] = [
    ExtractionStrategy {
        name: "video.url",
        extract: |v| pluck_string(v, &["video", "url"]),
    },
    ExtractionStrategy {
        name: "videos[0].url",
        extract: |v| pluck_string(v, &["videos", "0", "url"]),
    },
];

pub struct FalBackend {
    client: Client,
    base_url: String,
    model: String,
    auth: AuthScheme,
    policy: RetryPolicy,
    poll_interval: Duration,
    timeout: Duration,
}

impl FalBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GenerationError::Config("fal requires api_key".to_string()))?;

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
            auth: AuthScheme::Key { key: api_key },
            policy: RetryPolicy::with_max_attempts(config.max_create_attempts),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        })
    }

    /// Status/response URLs from the enqueue response, with path-template
    /// fallbacks when the backend omits them.
    fn queue_urls(&self, created: &Value, request_id: &str) -> (String, String) {
        let status_url = pluck_string(created, &["status_url"]).unwrap_or_else(|| {
            format!(
                "{}/{}/requests/{}/status",
                self.base_url, self.model, request_id
            )
        });
        let response_url = pluck_string(created, &["response_url"]).unwrap_or_else(|| {
            format!("{}/{}/requests/{}", self.base_url, self.model, request_id)
        });
        (status_url, response_url)
    }

    fn is_completed(status: &Value) -> bool {
        matches!(
            pluck_string(status, &["status"]).as_deref(),
            Some("COMPLETED")
        )
    }
}

#[async_trait]
impl GenerationBackend for FalBackend {
    async fn generate_clip(
        &self,
        request: &ClipRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let create_url = format!("{}/{}", self.base_url, self.model);
        let body = json!({
            "prompt": request.prompt.clone().unwrap_or_default(),
            "image_url": request.start_frame,
            "tail_image_url": request.end_frame,
            "duration": format!("{}", request.duration_secs.round() as u64),
        });

        let (created, auth_header) = with_retry(&self.policy, |_| {
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

        // Fast path: synchronous result in the enqueue response.
        if let Some(url) = extract_video_url(&created, &RESULT_STRATEGIES) {
            return Ok(GenerationResult { video_url: url });
        }

        let request_id =
            pluck_string(&created, &["request_id"]).ok_or(GenerationError::MissingResult)?;
        let (status_url, response_url) = self.queue_urls(&created, &request_id);
        debug!(request_id = %request_id, "Enqueued fal generation request");

        let video_url = poll_until(self.poll_interval, self.timeout, || {
            let status_url = status_url.clone();
            let response_url = response_url.clone();
            let header = auth_header.clone();
            async move {
                let status = match self
                    .client
                    .get(&status_url)
                    .header(AUTHORIZATION, &header)
                    .send()
                    .await
                {
                    Ok(response) => match read_json_response(response).await {
                        Ok(value) => value,
                        Err(err) => {
                            debug!(error = %err, "Status response unusable, treating as pending");
                            return PollOutcome::Pending;
                        }
                    },
                    Err(err) => {
                        debug!(error = %err, "Status request failed, treating as pending");
                        return PollOutcome::Pending;
                    }
                };

                if !Self::is_completed(&status) {
                    return PollOutcome::Pending;
                }

                // Completed: fetch the result payload.
                let response = match self
                    .client
                    .get(&response_url)
                    .header(AUTHORIZATION, &header)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(err) => {
                        debug!(error = %err, "Result fetch failed, treating as pending");
                        return PollOutcome::Pending;
                    }
                };
                match read_json_response(response).await {
                    Ok(value) => match extract_video_url(&value, &RESULT_STRATEGIES) {
                        Some(url) => PollOutcome::Ready(url),
                        None => PollOutcome::Failed(GenerationError::MissingResult),
                    },
                    // The task completed but its result is an error payload.
                    Err(GenerationError::Http { status, body }) => {
                        PollOutcome::Failed(GenerationError::TaskFailed(format!(
                            "result fetch returned {status}: {body}"
                        )))
                    }
                    Err(err) => {
                        debug!(error = %err, "Result payload unusable, treating as pending");
                        PollOutcome::Pending
                    }
                }
            }
        })
        .await?;

        Ok(GenerationResult { video_url })
    }

    fn name(&self) -> &str {
        "fal"
    }
}

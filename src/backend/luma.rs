//! Luma Dream Machine task client.
//!
//! Static bearer authentication. Create submits start/end keyframes; the
//! response may already be a completed generation (fast path) or an id to
//! poll. Generations move through `queued` and `dreaming` before reaching a
//! terminal `completed` or `failed` state.

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

const DEFAULT_BASE_URL: &str = "https://api.lumalabs.ai/dream-machine/v1";
const DEFAULT_MODEL: &str = "ray-2";

const RESULT_STRATEGIES: [ExtractionStrategy; 2] = [
    ExtractionStrategy {
        name: "assets.video",
        extract: |v| pluck_string(v, &["assets", "video"]),
    },
    ExtractionStrategy {
        name: "video.url",
        extract: |v| pluck_string(v, &["video", "url"]),
    },
];

pub struct LumaBackend {
    client: Client,
    base_url: String,
    model: String,
    auth: AuthScheme,
    policy: RetryPolicy,
    poll_interval: Duration,
    timeout: Duration,
}

impl LumaBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GenerationError::Config("luma requires api_key".to_string()))?;

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
            auth: AuthScheme::Bearer { key: api_key },
            policy: RetryPolicy::with_max_attempts(config.max_create_attempts),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        })
    }

    fn poll_outcome(value: &Value) -> PollOutcome<String> {
        match pluck_string(value, &["state"]).as_deref() {
            Some("completed") => match extract_video_url(value, &RESULT_STRATEGIES) {
                Some(url) => PollOutcome::Ready(url),
                None => PollOutcome::Failed(GenerationError::MissingResult),
            },
            Some("failed") => {
                let reason = pluck_string(value, &["failure_reason"])
                    .unwrap_or_else(|| "generation failed".to_string());
                PollOutcome::Failed(GenerationError::TaskFailed(reason))
            }
            // queued / dreaming / unknown states keep polling
            _ => PollOutcome::Pending,
        }
    }
}

#[async_trait]
impl GenerationBackend for LumaBackend {
    async fn generate_clip(
        &self,
        request: &ClipRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let create_url = format!("{}/generations", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": request.prompt.clone().unwrap_or_default(),
            "duration": format!("{}s", request.duration_secs.round() as u64),
            "keyframes": {
                "frame0": { "type": "image", "url": request.start_frame },
                "frame1": { "type": "image", "url": request.end_frame },
            },
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

        // Fast path: the create response is already a completed generation.
        if pluck_string(&created, &["state"]).as_deref() == Some("completed") {
            if let Some(url) = extract_video_url(&created, &RESULT_STRATEGIES) {
                return Ok(GenerationResult { video_url: url });
            }
        }

        let generation_id =
            pluck_string(&created, &["id"]).ok_or(GenerationError::MissingResult)?;
        debug!(generation_id = %generation_id, "Created luma generation");

        let poll_url = format!("{}/generations/{}", self.base_url, generation_id);
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
        "luma"
    }
}

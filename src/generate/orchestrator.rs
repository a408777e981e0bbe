//! Generation orchestrator: 4 ordered frames in, 3 ordered clips out.
//!
//! Fans three clip-generation requests out to the configured backend
//! concurrently, awaits all of them, and returns one ordered set or a single
//! failure. There is never a partial result: playback cannot usefully start
//! from two of three transitions, and backend costs are sunk once a task is
//! created, so nothing is cancelled early either.

use crate::backend::{BackendFactory, ClipRequest, GenerationBackend};
use crate::clip::{ClipSet, FrameSet, VideoClip, CLIPS_PER_SET};
use crate::config::EverloopConfig;
use crate::error::GenerationError;
use futures::future::join_all;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates clip generation against one backend selected at construction.
pub struct ClipOrchestrator {
    backend: Box<dyn GenerationBackend>,
}

impl ClipOrchestrator {
    /// Resolve the configured backend name to one task client. Selection
    /// happens once here, never per call.
    pub fn from_config(config: &EverloopConfig) -> Result<Self, GenerationError> {
        let backend_config = config.selected_backend()?;
        let backend = BackendFactory::create(backend_config)?;
        info!(backend = backend.name(), "Generation backend selected");
        Ok(Self { backend })
    }

    pub fn with_backend(backend: Box<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Generate the 3 transition clips for `frames`, atomically.
    ///
    /// All 3 calls are issued concurrently and all are awaited before
    /// deciding success or failure. Output order matches frame-pair order
    /// regardless of completion order.
    pub async fn generate_clips(
        &self,
        frames: &FrameSet,
        duration_secs: f64,
        prompt: Option<&str>,
    ) -> Result<ClipSet, GenerationError> {
        let requests: Vec<ClipRequest> = frames
            .pairs()
            .into_iter()
            .map(|(start, end)| ClipRequest {
                start_frame: start.to_string(),
                end_frame: end.to_string(),
                duration_secs,
                prompt: prompt.map(|p| p.to_string()),
            })
            .collect();

        let started = Instant::now();
        info!(
            backend = self.backend.name(),
            clips = CLIPS_PER_SET,
            duration_secs,
            "Starting clip set generation"
        );

        let outcomes = join_all(
            requests
                .iter()
                .map(|request| self.backend.generate_clip(request)),
        )
        .await;

        let mut clips = Vec::with_capacity(CLIPS_PER_SET);
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => {
                    debug!(
                        clip_index = index,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Clip generated"
                    );
                    clips.push(VideoClip::new(result.video_url));
                }
                Err(err) => {
                    warn!(
                        backend = self.backend.name(),
                        clip_index = index,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "Clip generation failed, discarding set"
                    );
                    return Err(GenerationError::Partial {
                        failed_index: index,
                        source: Box::new(err),
                    });
                }
            }
        }

        let clips: [VideoClip; CLIPS_PER_SET] = clips
            .try_into()
            .expect("exactly CLIPS_PER_SET clips collected");
        let set = ClipSet::new(clips);
        info!(
            backend = self.backend.name(),
            set_id = set.id().as_u64(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Clip set generation complete"
        );
        Ok(set)
    }
}

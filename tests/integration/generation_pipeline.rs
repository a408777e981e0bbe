//! Integration tests for the fan-out generation pipeline

use async_trait::async_trait;
use everloop::backend::{ClipRequest, GenerationBackend, GenerationResult};
use everloop::clip::FrameSet;
use everloop::error::GenerationError;
use everloop::generate::ClipOrchestrator;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend double scripted per start frame. Unlisted frames succeed with a
/// derived URL. Records every request it receives.
struct ScriptedBackend {
    failures: Mutex<HashMap<String, GenerationError>>,
    calls: Arc<Mutex<Vec<ClipRequest>>>,
    in_flight_peak: Arc<AtomicUsize>,
    in_flight: AtomicUsize,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight_peak: Arc::new(AtomicUsize::new(0)),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn fail_frame(self, frame: &str, error: GenerationError) -> Self {
        self.failures.lock().insert(frame.to_string(), error);
        self
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_clip(
        &self,
        request: &ClipRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.calls.lock().push(request.clone());
        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight_peak.fetch_max(depth, Ordering::SeqCst);
        // yield so sibling legs get polled while this one is in flight
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().remove(&request.start_frame) {
            return Err(error);
        }
        Ok(GenerationResult {
            video_url: format!("https://cdn.example/{}-{}.mp4", request.start_frame, request.end_frame),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn frames() -> FrameSet {
    FrameSet::from_urls(vec![
        "f0".to_string(),
        "f1".to_string(),
        "f2".to_string(),
        "f3".to_string(),
    ])
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn four_frames_in_three_ordered_clips_out() {
    let orchestrator = ClipOrchestrator::with_backend(Box::new(ScriptedBackend::new()));

    let set = orchestrator
        .generate_clips(&frames(), 5.0, Some("slow dolly forward"))
        .await
        .unwrap();

    assert_eq!(set.len(), 3);
    assert_eq!(set.clip(0).url, "https://cdn.example/f0-f1.mp4");
    assert_eq!(set.clip(1).url, "https://cdn.example/f1-f2.mp4");
    assert_eq!(set.clip(2).url, "https://cdn.example/f2-f3.mp4");
}

#[tokio::test(start_paused = true)]
async fn legs_run_concurrently() {
    let backend = ScriptedBackend::new();
    let peak = backend.in_flight_peak.clone();
    let orchestrator = ClipOrchestrator::with_backend(Box::new(backend));

    orchestrator.generate_clips(&frames(), 5.0, None).await.unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn one_failure_discards_the_whole_set() {
    let backend = ScriptedBackend::new().fail_frame(
        "f2",
        GenerationError::TaskFailed("content policy".to_string()),
    );
    let calls = backend.calls.clone();
    let orchestrator = ClipOrchestrator::with_backend(Box::new(backend));

    let err = orchestrator
        .generate_clips(&frames(), 5.0, None)
        .await
        .unwrap_err();

    match err {
        GenerationError::Partial {
            failed_index,
            source,
        } => {
            assert_eq!(failed_index, 2);
            assert!(matches!(*source, GenerationError::TaskFailed(_)));
        }
        other => panic!("expected a partial-set failure, got {other}"),
    }
    // no early cancellation: every leg was still issued
    assert_eq!(calls.lock().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn first_failure_wins_when_several_legs_fail() {
    let backend = ScriptedBackend::new()
        .fail_frame(
            "f0",
            GenerationError::Timeout {
                waited: Duration::from_secs(240),
            },
        )
        .fail_frame("f2", GenerationError::TaskFailed("boom".to_string()));
    let orchestrator = ClipOrchestrator::with_backend(Box::new(backend));

    let err = orchestrator
        .generate_clips(&frames(), 5.0, None)
        .await
        .unwrap_err();
    match err {
        GenerationError::Partial { failed_index, .. } => assert_eq!(failed_index, 0),
        other => panic!("expected a partial-set failure, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn consecutive_sets_get_increasing_ids() {
    let orchestrator = ClipOrchestrator::with_backend(Box::new(ScriptedBackend::new()));

    let first = orchestrator.generate_clips(&frames(), 5.0, None).await.unwrap();
    let second = orchestrator.generate_clips(&frames(), 5.0, None).await.unwrap();
    assert!(second.id().as_u64() > first.id().as_u64());
}

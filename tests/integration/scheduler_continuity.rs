//! Integration tests for continuous playback over the public scheduler API

use async_trait::async_trait;
use everloop::clip::ClipSet;
use everloop::config::SchedulerConfig;
use everloop::error::PlaybackError;
use everloop::scheduler::{BufferId, ContinuityScheduler, PlaybackSurface, SchedulerEvent};
use std::time::Duration;

/// Surface double driven entirely by the test: readiness, position, and clip
/// end are poked between ticks, and every call is recorded in order.
struct ScriptedSurface {
    loaded: [Option<String>; 2],
    playing: [bool; 2],
    visible: Option<BufferId>,
    ready: [bool; 2],
    ended: [bool; 2],
    position: [Option<Duration>; 2],
    duration: [Option<Duration>; 2],
    log: Vec<String>,
}

impl ScriptedSurface {
    fn new() -> Self {
        Self {
            loaded: [None, None],
            playing: [false, false],
            visible: None,
            ready: [false, false],
            ended: [false, false],
            position: [None, None],
            duration: [None, None],
            log: Vec::new(),
        }
    }

    fn approach_end(&mut self, buffer: BufferId) {
        self.position[buffer.index_for_test()] = Some(Duration::from_millis(4_600));
        self.duration[buffer.index_for_test()] = Some(Duration::from_millis(5_000));
    }
}

trait BufferIndex {
    fn index_for_test(self) -> usize;
}

impl BufferIndex for BufferId {
    fn index_for_test(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
}

#[async_trait]
impl PlaybackSurface for ScriptedSurface {
    async fn load(&mut self, buffer: BufferId, url: &str) -> Result<(), PlaybackError> {
        self.log.push(format!("load:{buffer}:{url}"));
        self.loaded[buffer.index_for_test()] = Some(url.to_string());
        self.ready[buffer.index_for_test()] = true;
        self.ended[buffer.index_for_test()] = false;
        self.position[buffer.index_for_test()] = Some(Duration::ZERO);
        Ok(())
    }

    async fn play(&mut self, buffer: BufferId) -> Result<(), PlaybackError> {
        self.log.push(format!("play:{buffer}"));
        self.playing[buffer.index_for_test()] = true;
        Ok(())
    }

    async fn pause(&mut self, buffer: BufferId) -> Result<(), PlaybackError> {
        self.log.push(format!("pause:{buffer}"));
        self.playing[buffer.index_for_test()] = false;
        Ok(())
    }

    async fn set_visible(&mut self, buffer: BufferId) -> Result<(), PlaybackError> {
        self.log.push(format!("visible:{buffer}"));
        self.visible = Some(buffer);
        Ok(())
    }

    fn position(&self, buffer: BufferId) -> Option<Duration> {
        self.position[buffer.index_for_test()]
    }

    fn duration(&self, buffer: BufferId) -> Option<Duration> {
        self.duration[buffer.index_for_test()]
    }

    fn is_ready(&self, buffer: BufferId) -> bool {
        self.ready[buffer.index_for_test()]
    }

    fn has_ended(&self, buffer: BufferId) -> bool {
        self.ended[buffer.index_for_test()]
    }
}

fn clip_set(prefix: &str) -> ClipSet {
    ClipSet::from_urls(vec![
        format!("https://cdn.example/{prefix}-0.mp4"),
        format!("https://cdn.example/{prefix}-1.mp4"),
        format!("https://cdn.example/{prefix}-2.mp4"),
    ])
    .unwrap()
}

fn scheduler() -> ContinuityScheduler<ScriptedSurface> {
    ContinuityScheduler::new(
        ScriptedSurface::new(),
        SchedulerConfig {
            swap_threshold_ms: 500,
            ready_wait_ms: 200,
            visibility_delay_ms: 10,
        },
    )
}

/// Drive one full loop of the initial set and into the next: every swap must
/// alternate buffers and the clip index must wrap 0,1,2,0,1.
#[tokio::test(start_paused = true)]
async fn playback_loops_seamlessly_over_one_set() {
    let mut sched = scheduler();
    sched.boot(clip_set("loop")).await;
    assert_eq!(sched.active_buffer(), Some(BufferId::A));

    let mut expected_buffer = BufferId::A;
    for expected_index in [1usize, 2, 0, 1] {
        let active = sched.active_buffer().unwrap();
        assert_eq!(active, expected_buffer);
        sched.surface_mut().approach_end(active);
        sched.tick().await;

        expected_buffer = expected_buffer.other();
        assert_eq!(sched.active_buffer(), Some(expected_buffer));
        assert_eq!(sched.active_clip_index(), Some(expected_index));
        assert_eq!(sched.surface_mut().visible, Some(expected_buffer));
        assert!(!sched.swap_in_progress());
    }

    // the loop never left the original set
    assert!(sched.current_set().unwrap().clip(0).url.contains("loop-0"));
}

#[tokio::test(start_paused = true)]
async fn every_swap_plays_the_incoming_buffer_before_revealing_it() {
    let mut sched = scheduler();
    sched.boot(clip_set("order")).await;

    for _ in 0..3 {
        let active = sched.active_buffer().unwrap();
        let incoming = active.other();
        sched.surface_mut().approach_end(active);
        sched.surface_mut().log.clear();
        sched.tick().await;

        let log = sched.surface_mut().log.clone();
        let play = log
            .iter()
            .position(|e| *e == format!("play:{incoming}"))
            .unwrap();
        let visible = log
            .iter()
            .position(|e| *e == format!("visible:{incoming}"))
            .unwrap();
        let pause = log
            .iter()
            .position(|e| *e == format!("pause:{active}"))
            .unwrap();
        assert!(play < visible && visible < pause, "swap order wrong: {log:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn handle_splice_is_applied_at_the_next_boundary() {
    let mut sched = scheduler();
    sched.boot(clip_set("old")).await;
    let handle = sched.handle();

    let fresh = clip_set("fresh");
    let fresh_id = fresh.id();
    handle.splice(fresh).unwrap();

    // mid-clip: the splice stays pending
    sched.surface_mut().position[0] = Some(Duration::from_millis(1_000));
    sched.surface_mut().duration[0] = Some(Duration::from_millis(5_000));
    sched.tick().await;
    assert_ne!(sched.current_set().unwrap().id(), fresh_id);

    sched.surface_mut().approach_end(BufferId::A);
    sched.tick().await;
    assert_eq!(sched.current_set().unwrap().id(), fresh_id);
    assert_eq!(sched.active_clip_index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn newest_splice_replaces_an_unapplied_one() {
    let mut sched = scheduler();
    sched.boot(clip_set("old")).await;
    let handle = sched.handle();

    handle.splice(clip_set("stale")).unwrap();
    let newest = clip_set("newest");
    let newest_id = newest.id();
    handle.splice(newest).unwrap();

    sched.surface_mut().approach_end(BufferId::A);
    sched.tick().await;

    assert_eq!(sched.current_set().unwrap().id(), newest_id);
    let log = &sched.surface_mut().log;
    assert!(log.iter().all(|e| !e.contains("stale")));
}

#[tokio::test(start_paused = true)]
async fn jump_preempts_the_current_clip() {
    let mut sched = scheduler();
    sched.boot(clip_set("present")).await;
    let handle = sched.handle();

    // nowhere near the end of the active clip
    sched.surface_mut().position[0] = Some(Duration::from_millis(500));
    sched.surface_mut().duration[0] = Some(Duration::from_millis(5_000));

    let past = clip_set("past");
    let past_id = past.id();
    handle.jump(past).unwrap();
    sched.tick().await;

    assert_eq!(sched.current_set().unwrap().id(), past_id);
    assert_eq!(sched.active_clip_index(), Some(0));
    assert_eq!(sched.active_buffer(), Some(BufferId::B));
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_scheduler() {
    let handle = {
        let sched = scheduler();
        sched.handle()
    };
    assert!(matches!(
        handle.splice(clip_set("late")),
        Err(PlaybackError::SchedulerStopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_boot_and_every_swap() {
    let mut sched = scheduler();
    let mut events = sched.subscribe();

    let first = clip_set("first");
    let first_id = first.id();
    sched.boot(first).await;

    for _ in 0..2 {
        let active = sched.active_buffer().unwrap();
        sched.surface_mut().approach_end(active);
        sched.tick().await;
    }

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SchedulerEvent::NowPlaying {
                set_id: first_id,
                clip_index: 0
            },
            SchedulerEvent::NowPlaying {
                set_id: first_id,
                clip_index: 1
            },
            SchedulerEvent::NowPlaying {
                set_id: first_id,
                clip_index: 2
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn swap_proceeds_when_readiness_never_arrives() {
    let mut sched = scheduler();
    sched.boot(clip_set("s")).await;

    // the idle buffer refuses to become ready
    sched.surface_mut().ready = [false, false];
    sched.surface_mut().approach_end(BufferId::A);

    sched.tick().await;

    // continuity wins: the swap completed anyway after the bounded wait
    assert_eq!(sched.active_buffer(), Some(BufferId::B));
    assert!(!sched.swap_in_progress());
}

//! Continuity Scheduler
//!
//! Renders an apparently-continuous video stream from discrete 3-clip sets.
//! Two playback buffers alternate: while one is visible and playing, the next
//! clip is preloaded into the other. Shortly before the active clip ends (or
//! when it ends, as a fallback) the idle buffer starts playing *before*
//! visibility flips, so the first visible frame is never black or unready.
//!
//! Freshly generated clip sets are spliced in through the same swap
//! mechanics, and time-travel jumps are applied as soon as possible. At most
//! one pending replacement set is held: a newer arrival overwrites an
//! unapplied older one (latest-wins).
//!
//! The scheduler is a single-threaded cooperative loop: the embedder calls
//! `tick()` at render-loop cadence and every state mutation happens there.

use crate::clip::{ClipSet, CLIPS_PER_SET};
use crate::config::SchedulerConfig;
use crate::error::PlaybackError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

mod events;
mod surface;

pub use events::SchedulerEvent;
pub use surface::{BufferId, PlaybackSurface};

/// How often the bounded ready-wait re-checks buffer readiness.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a pending replacement set is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchKind {
    /// Applied at the next swap opportunity (threshold or clip end).
    Splice,
    /// Applied as soon as possible.
    Jump,
}

#[derive(Debug, Clone)]
struct PendingSwitch {
    set: ClipSet,
    kind: SwitchKind,
}

/// Playback bookkeeping. Created at boot, mutated only by the scheduler's
/// own swap routines.
#[derive(Debug)]
struct PlaybackState {
    active: BufferId,
    clip_index: usize,
    clip_set: ClipSet,
    /// URL currently loaded into each buffer, indexed by `BufferId::index`.
    loaded: [Option<String>; 2],
    swap_in_progress: bool,
    last_swap: Option<Instant>,
}

/// What a swap cycle switches to.
enum SwitchTarget {
    /// Next clip of the current set, wrapping past the end.
    NextClip,
    /// Clip 0 of a replacement set.
    NewSet(ClipSet),
}

/// Handle for submitting replacement clip sets from other tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<PendingSwitch>,
}

impl SchedulerHandle {
    /// Queue a freshly generated set for splice-in at the next safe
    /// opportunity. Overwrites any unapplied pending set.
    pub fn splice(&self, set: ClipSet) -> Result<(), PlaybackError> {
        self.tx
            .send(PendingSwitch {
                set,
                kind: SwitchKind::Splice,
            })
            .map_err(|_| PlaybackError::SchedulerStopped)
    }

    /// Queue a time-travel jump, applied as soon as possible.
    pub fn jump(&self, set: ClipSet) -> Result<(), PlaybackError> {
        self.tx
            .send(PendingSwitch {
                set,
                kind: SwitchKind::Jump,
            })
            .map_err(|_| PlaybackError::SchedulerStopped)
    }
}

/// Dual-buffer continuity scheduler over a playback surface.
pub struct ContinuityScheduler<S: PlaybackSurface> {
    surface: S,
    config: SchedulerConfig,
    state: Option<PlaybackState>,
    pending: Option<PendingSwitch>,
    interrupt_tx: mpsc::UnboundedSender<PendingSwitch>,
    interrupt_rx: mpsc::UnboundedReceiver<PendingSwitch>,
    subscribers: Vec<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl<S: PlaybackSurface> ContinuityScheduler<S> {
    pub fn new(surface: S, config: SchedulerConfig) -> Self {
        let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();
        Self {
            surface,
            config,
            state: None,
            pending: None,
            interrupt_tx,
            interrupt_rx,
            subscribers: Vec::new(),
        }
    }

    /// Cloneable handle for submitting splices and jumps from other tasks.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.interrupt_tx.clone(),
        }
    }

    /// Subscribe to now-playing notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SchedulerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Access the underlying surface (embedder integration).
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn active_buffer(&self) -> Option<BufferId> {
        self.state.as_ref().map(|s| s.active)
    }

    pub fn active_clip_index(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.clip_index)
    }

    pub fn current_set(&self) -> Option<&ClipSet> {
        self.state.as_ref().map(|s| &s.clip_set)
    }

    pub fn swap_in_progress(&self) -> bool {
        self.state
            .as_ref()
            .map(|s| s.swap_in_progress)
            .unwrap_or(false)
    }

    /// When the last swap completed, if any has.
    pub fn last_swap(&self) -> Option<Instant> {
        self.state.as_ref().and_then(|s| s.last_swap)
    }

    /// Record a replacement set directly (same semantics as the handle).
    pub fn splice(&mut self, set: ClipSet) {
        self.pending = Some(PendingSwitch {
            set,
            kind: SwitchKind::Splice,
        });
    }

    pub fn jump(&mut self, set: ClipSet) {
        self.pending = Some(PendingSwitch {
            set,
            kind: SwitchKind::Jump,
        });
    }

    /// Boot playback: clip 0 into buffer A, clip 1 preloaded into B, A
    /// visible and playing.
    pub async fn boot(&mut self, set: ClipSet) {
        let mut loaded: [Option<String>; 2] = [None, None];

        let first = set.clip(0).url.clone();
        let result = self.surface.load(BufferId::A, &first).await;
        if self.try_surface(result, "load") {
            loaded[BufferId::A.index()] = Some(first);
        }
        let second = set.clip(1).url.clone();
        let result = self.surface.load(BufferId::B, &second).await;
        if self.try_surface(result, "load") {
            loaded[BufferId::B.index()] = Some(second);
        }

        let result = self.surface.set_visible(BufferId::A).await;
        self.try_surface(result, "set_visible");
        let result = self.surface.play(BufferId::A).await;
        self.try_surface(result, "play");

        let set_id = set.id();
        self.state = Some(PlaybackState {
            active: BufferId::A,
            clip_index: 0,
            clip_set: set,
            loaded,
            swap_in_progress: false,
            last_swap: None,
        });

        info!(set_id = set_id.as_u64(), "Playback booted");
        self.emit(SchedulerEvent::NowPlaying {
            set_id,
            clip_index: 0,
        });
    }

    /// One cooperative step. No-op until booted; no-op while a swap cycle is
    /// marked in progress.
    pub async fn tick(&mut self) {
        self.drain_interrupts();

        let Some(state) = self.state.as_ref() else {
            return;
        };
        if state.swap_in_progress {
            return;
        }

        let jump_pending = matches!(
            self.pending,
            Some(PendingSwitch {
                kind: SwitchKind::Jump,
                ..
            })
        );

        if jump_pending {
            let pending = self.pending.take().expect("jump pending");
            self.execute_switch(SwitchTarget::NewSet(pending.set)).await;
            return;
        }

        if !self.swap_due() {
            return;
        }

        match self.pending.take() {
            Some(pending) => {
                self.execute_switch(SwitchTarget::NewSet(pending.set))
                    .await;
            }
            None => {
                self.execute_switch(SwitchTarget::NextClip).await;
            }
        }
    }

    /// Latest-wins drain of externally submitted switch requests.
    fn drain_interrupts(&mut self) {
        while let Ok(request) = self.interrupt_rx.try_recv() {
            if self.pending.is_some() {
                debug!("Pending clip set overwritten by newer request");
            }
            self.pending = Some(request);
        }
    }

    /// Whether the active clip is within the swap threshold of its end, or
    /// has already ended (fallback for shorter-than-expected clips).
    fn swap_due(&self) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        let active = state.active;
        if self.surface.has_ended(active) {
            return true;
        }
        match (self.surface.position(active), self.surface.duration(active)) {
            (Some(position), Some(duration)) => {
                let threshold = self.config.swap_threshold();
                duration > threshold && position >= duration - threshold
            }
            _ => false,
        }
    }

    /// The full swap cycle: make sure the idle buffer holds the right clip,
    /// wait for readiness (bounded), start it, flip visibility, pause the old
    /// buffer, preload the following clip.
    async fn execute_switch(&mut self, target: SwitchTarget) {
        let (old_active, idle) = {
            let state = self.state.as_mut().expect("booted");
            state.swap_in_progress = true;
            (state.active, state.active.other())
        };

        let (next_set, next_index) = match target {
            SwitchTarget::NextClip => (None, self.next_wrapped_index()),
            SwitchTarget::NewSet(set) => (Some(set), 0),
        };
        let target_set = next_set
            .clone()
            .unwrap_or_else(|| self.state.as_ref().expect("booted").clip_set.clone());
        let expected_url = target_set.clip(next_index).url.clone();

        // Desync guard: reload if the idle buffer does not hold the clip we
        // are about to reveal.
        let idle_loaded = self.state.as_ref().expect("booted").loaded[idle.index()].clone();
        if idle_loaded.as_deref() != Some(expected_url.as_str()) {
            if idle_loaded.is_some() {
                warn!(buffer = %idle, "Idle buffer desync detected, reloading");
            }
            let result = self.surface.load(idle, &expected_url).await;
            if self.try_surface(result, "load") {
                self.state.as_mut().expect("booted").loaded[idle.index()] =
                    Some(expected_url.clone());
            }
        }

        // Bounded readiness wait; continuity wins over readiness, so on
        // expiry the swap proceeds best-effort.
        let deadline = Instant::now() + self.config.ready_wait();
        while !self.surface.is_ready(idle) && Instant::now() < deadline {
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        if !self.surface.is_ready(idle) {
            warn!(buffer = %idle, "Idle buffer never reported ready, swapping best-effort");
        }

        // Start the incoming buffer before it becomes visible, then give
        // rendering a moment so the first visible frame is a real frame.
        let result = self.surface.play(idle).await;
        self.try_surface(result, "play");
        tokio::time::sleep(self.config.visibility_delay()).await;
        let result = self.surface.set_visible(idle).await;
        self.try_surface(result, "set_visible");
        let result = self.surface.pause(old_active).await;
        self.try_surface(result, "pause");

        let set_id = {
            let state = self.state.as_mut().expect("booted");
            state.active = idle;
            state.clip_index = next_index;
            if let Some(set) = next_set {
                state.clip_set = set;
            }
            state.clip_set.id()
        };

        // Preload the clip after this one into the now-idle buffer.
        let follow_index = (next_index + 1) % CLIPS_PER_SET;
        let follow_url = self
            .state
            .as_ref()
            .expect("booted")
            .clip_set
            .clip(follow_index)
            .url
            .clone();
        let result = self.surface.load(old_active, &follow_url).await;
        if self.try_surface(result, "load") {
            self.state.as_mut().expect("booted").loaded[old_active.index()] = Some(follow_url);
        }

        {
            let state = self.state.as_mut().expect("booted");
            state.swap_in_progress = false;
            state.last_swap = Some(Instant::now());
        }

        debug!(
            buffer = %idle,
            clip_index = next_index,
            set_id = set_id.as_u64(),
            "Swap complete"
        );
        self.emit(SchedulerEvent::NowPlaying {
            set_id,
            clip_index: next_index,
        });
    }

    fn next_wrapped_index(&self) -> usize {
        let state = self.state.as_ref().expect("booted");
        (state.clip_index + 1) % CLIPS_PER_SET
    }

    /// Playback-side faults are logged, never fatal to the loop.
    fn try_surface(&self, result: Result<(), PlaybackError>, op: &str) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(op, error = %err, "Playback surface call failed, continuing");
                false
            }
        }
    }

    fn emit(&mut self, event: SchedulerEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

//! Playback surface abstraction.
//!
//! The two underlying media buffers are an external collaborator (a browser
//! media-rendering primitive or an embedded player). The scheduler treats
//! them as a capability set: load, play, pause, visibility, and read-only
//! time/readiness reporting. The scheduler is the only writer of buffer
//! state.

use crate::error::PlaybackError;
use async_trait::async_trait;
use std::time::Duration;

/// Identity of one of the two alternating playback buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    /// The other buffer of the pair.
    pub fn other(self) -> Self {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferId::A => write!(f, "A"),
            BufferId::B => write!(f, "B"),
        }
    }
}

/// Capability set over a pair of media buffers.
#[async_trait]
pub trait PlaybackSurface: Send {
    /// Load a clip URL into a buffer, replacing its current content.
    async fn load(&mut self, buffer: BufferId, url: &str) -> Result<(), PlaybackError>;

    /// Begin or resume playback of a buffer.
    async fn play(&mut self, buffer: BufferId) -> Result<(), PlaybackError>;

    /// Pause playback of a buffer.
    async fn pause(&mut self, buffer: BufferId) -> Result<(), PlaybackError>;

    /// Make a buffer the visible one. The previously visible buffer becomes
    /// hidden; it is not paused implicitly.
    async fn set_visible(&mut self, buffer: BufferId) -> Result<(), PlaybackError>;

    /// Current playback position, when known.
    fn position(&self, buffer: BufferId) -> Option<Duration>;

    /// Total duration of the loaded clip, when known.
    fn duration(&self, buffer: BufferId) -> Option<Duration>;

    /// Whether the buffer has enough data to start playing.
    fn is_ready(&self, buffer: BufferId) -> bool;

    /// Whether the loaded clip has played to its end.
    fn has_ended(&self, buffer: BufferId) -> bool;
}

//! Core data model: frame sets, clip sets, and their arity invariants.
//!
//! A `FrameSet` holds exactly 4 ordered narrative frames; a `ClipSet` holds
//! exactly 3 ordered transition clips (frame 0->1, 1->2, 2->3). Clip sets are
//! atomic: they are generated, spliced, and played as a whole or not at all.

use crate::error::{GenerationError, PlaybackError};
use serde::{Deserialize, Serialize};

/// Number of transition clips in a set.
pub const CLIPS_PER_SET: usize = 3;

/// Number of narrative frames backing a clip set.
pub const FRAMES_PER_SET: usize = 4;

/// Monotonic identity for a clip set, used for history and now-playing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipSetId(u64);

impl ClipSetId {
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ClipSetId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A single playable transition clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoClip {
    pub url: String,
}

impl VideoClip {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// An ordered, atomic triple of transition clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSet {
    id: ClipSetId,
    clips: [VideoClip; CLIPS_PER_SET],
}

impl ClipSet {
    pub fn new(clips: [VideoClip; CLIPS_PER_SET]) -> Self {
        Self {
            id: ClipSetId::next(),
            clips,
        }
    }

    /// Build a clip set from URLs, rejecting anything that is not exactly
    /// 3 clips. This is the boundary where malformed sets are turned away.
    pub fn from_urls(urls: Vec<String>) -> Result<Self, PlaybackError> {
        let len = urls.len();
        let clips: [VideoClip; CLIPS_PER_SET] = urls
            .into_iter()
            .map(VideoClip::new)
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| PlaybackError::InvalidClipSet { len })?;
        Ok(Self::new(clips))
    }

    pub fn id(&self) -> ClipSetId {
        self.id
    }

    pub fn clip(&self, index: usize) -> &VideoClip {
        &self.clips[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &VideoClip> {
        self.clips.iter()
    }

    pub fn len(&self) -> usize {
        CLIPS_PER_SET
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Four ordered frame image references (URLs or data URIs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSet {
    frames: [String; FRAMES_PER_SET],
}

impl FrameSet {
    pub fn new(frames: [String; FRAMES_PER_SET]) -> Self {
        Self { frames }
    }

    pub fn from_urls(urls: Vec<String>) -> Result<Self, GenerationError> {
        let len = urls.len();
        let frames: [String; FRAMES_PER_SET] = urls
            .try_into()
            .map_err(|_| GenerationError::InvalidFrameSet { len })?;
        Ok(Self::new(frames))
    }

    pub fn frame(&self, index: usize) -> &str {
        &self.frames[index]
    }

    /// The 3 ordered (start, end) frame pairs, one per transition clip.
    pub fn pairs(&self) -> [(&str, &str); CLIPS_PER_SET] {
        [
            (&self.frames[0], &self.frames[1]),
            (&self.frames[1], &self.frames[2]),
            (&self.frames[2], &self.frames[3]),
        ]
    }
}

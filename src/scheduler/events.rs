//! Typed scheduler events.
//!
//! Cross-component signaling goes through explicit channels scoped to the
//! scheduler's lifetime rather than a process-wide broadcast medium.
//! Subscribers receive a now-playing notification on boot and after every
//! completed swap or splice, which is what the history / time-travel UI
//! consumes.

use crate::clip::ClipSetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The visible buffer changed to this clip of this set.
    NowPlaying {
        set_id: ClipSetId,
        clip_index: usize,
    },
}

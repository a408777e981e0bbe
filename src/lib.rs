//! Everloop: Infinite Interactive Video Engine
//!
//! Plays an apparently-continuous stream of short video clips while new clips
//! are generated in the background by asynchronous image-to-video backends.
//! The continuity scheduler keeps two playback buffers in lockstep so clip
//! boundaries are invisible; the generation orchestrator turns four narrative
//! frames into three transition clips, or fails atomically.

pub mod backend;
pub mod clip;
pub mod config;
pub mod error;
pub mod generate;
pub mod logging;
pub mod scheduler;

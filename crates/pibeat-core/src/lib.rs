//! pibeat-core — shared domain types for the pibeat controller.
//!
//! Holds everything that is independent of the actual hardware and the MPD
//! socket: configuration, the button event enum, playback state, track
//! labelling, and the volume stepping rules.

pub mod config;
pub mod event;
pub mod status;

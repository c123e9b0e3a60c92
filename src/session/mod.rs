//! The composite session: wiring playback, compositor and recorder into one export.

/// Session orchestration, options and observers.
pub mod composite;
/// Service-level entry points for image and video merges.
pub mod merge;
/// Binding of the video and audio tracks into one stream.
pub mod mux;
/// Session state machine.
pub mod state;

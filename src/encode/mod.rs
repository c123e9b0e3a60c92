//! Encoding: container/codec negotiation, recorders and the finished artifact.
//!
//! A [`recorder::MediaHost`] answers which [`codec::ContainerCodec`]s it can produce and creates
//! [`recorder::Recorder`]s that consume the combined audio/video stream of one session.

/// The finalized output of a session.
pub mod artifact;
/// Container/codec pairs and preference-order negotiation.
pub mod codec;
/// Host backed by the system `ffmpeg`.
pub mod ffmpeg;
/// Host that records a compact capture log in memory.
pub mod memory;
/// Recorder and host traits plus the audio-authoritative frame timeline.
pub mod recorder;

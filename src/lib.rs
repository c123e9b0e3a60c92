//! avmerge composites raw PCM narration over a still image or a looping video and records the
//! result into a single shareable media file.
//!
//! # Pipeline overview
//!
//! 1. **Decode**: base64 16-bit PCM -> [`AudioSample`] (24 kHz mono, normalized)
//! 2. **Source**: image or video -> [`FrameSource`] ([`StillImage`] or [`LoopingVideo`])
//! 3. **Composite**: a [`Compositor`] redraws the source onto an even-sized [`RenderSurface`]
//!    every tick and exposes it as a [`VideoTrack`]
//! 4. **Multiplex**: [`CombinedStream`] binds the video track and the audio playback track
//! 5. **Record**: a [`CompositeSession`] negotiates a [`ContainerCodec`], records the combined
//!    stream through a [`MediaHost`] and finalizes when audio playback ends
//! 6. **Export**: [`ExportSink`] shares the [`EncodedArtifact`] or downloads it
//!
//! The audio duration is authoritative: the recording always ends with the audio, and the
//! visual track loops or is cut to match.
//!
//! Sessions run on a tokio runtime (a current-thread runtime is enough); encoding through
//! [`FfmpegHost`] requires the system `ffmpeg`.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assets;
mod audio;
mod encode;
mod export;
mod foundation;
mod render;
mod session;
mod source;

pub use assets::decode::{decode_image, decode_image_payload};
pub use assets::media::{VideoSourceInfo, decode_video_frames, probe_video};
pub use audio::pcm::{AudioSample, PCM_SAMPLE_RATE, decode_pcm_base64, decode_pcm_s16le};
pub use audio::playback::{
    AudioBlock, AudioPlayback, AudioTrack, DEFAULT_BLOCK_SAMPLES, PlaybackEnded,
};
pub use encode::artifact::{ArtifactInfo, EncodedArtifact};
pub use encode::codec::{ContainerCodec, negotiate};
pub use encode::ffmpeg::{
    FfmpegHost, FfmpegHostOpts, FfmpegRecorder, ensure_parent_dir, is_ffmpeg_on_path,
};
pub use encode::memory::{CaptureLog, InMemoryHost};
pub use encode::recorder::{
    DEFAULT_VIDEO_BITS_PER_SECOND, EncodedChunk, FrameTimeline, MediaHost, Recorder,
    RecorderConfig, RecorderOutput,
};
pub use export::command::{CommandShareTarget, SHARE_ABORTED_EXIT_CODE};
pub use export::sink::{
    Delivery, ExportOpts, ExportSink, ShareError, ShareTarget, ShareText, SharedFile, download,
};
pub use foundation::core::{Fps, FrameIndex, Raster, even_dimensions};
pub use foundation::error::{ErrorClass, MergeError, MergeResult};
pub use render::compositor::{Compositor, CompositorStats, DrawLoop, VideoFrame, VideoTrack};
pub use render::surface::RenderSurface;
pub use session::composite::{
    CancelHandle, CompositeSession, SessionObserver, SessionOpts, SetupStep,
};
pub use session::merge::{
    MergeOpts, VideoInput, merge_audio_and_image, merge_audio_and_video, merge_sources,
};
pub use session::mux::{CombinedStream, StreamItem};
pub use session::state::{SessionState, StateMachine};
pub use source::{
    FfmpegVideoDecoder, FrameSource, LoopingVideo, SourceKind, StillImage, VideoDecoder, VideoInfo,
};

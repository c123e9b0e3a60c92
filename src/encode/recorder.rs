use crate::audio::playback::AudioBlock;
use crate::encode::codec::ContainerCodec;
use crate::foundation::core::{Fps, Raster};
use crate::foundation::error::{MergeError, MergeResult};
use crate::render::compositor::VideoFrame;
use std::time::Duration;

/// Default video bit rate (2.5 Mbit/s).
pub const DEFAULT_VIDEO_BITS_PER_SECOND: u32 = 2_500_000;

/// Configuration handed to [`MediaHost::create_recorder`] during priming.
#[derive(Clone, Debug, PartialEq)]
pub struct RecorderConfig {
    /// Frame width in pixels (even).
    pub width: u32,
    /// Frame height in pixels (even).
    pub height: u32,
    /// Nominal capture rate.
    pub fps: Fps,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Total samples the audio track will deliver. Authoritative for the recorded duration.
    pub audio_samples: u64,
    /// Target video bit rate.
    pub video_bits_per_second: u32,
}

impl RecorderConfig {
    /// Check the invariants every recorder relies on.
    pub fn validate(&self) -> MergeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MergeError::validation(
                "recorder width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(MergeError::validation(
                "recorder width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(MergeError::validation("recorder fps must be non-zero"));
        }
        if self.sample_rate == 0 {
            return Err(MergeError::validation("recorder sample_rate must be non-zero"));
        }
        Ok(())
    }

    /// Duration of the audio track.
    pub fn audio_duration(&self) -> Duration {
        let nanos =
            u128::from(self.audio_samples) * 1_000_000_000 / u128::from(self.sample_rate.max(1));
        Duration::from_nanos(nanos as u64)
    }

    /// Number of video frames that cover the audio track.
    pub fn frame_count(&self) -> u64 {
        self.fps
            .frames_covering_samples(self.audio_samples, self.sample_rate)
    }
}

/// A piece of encoded output, in stream order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Encoded bytes.
    pub data: Vec<u8>,
}

/// Everything a recorder hands back once finalized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecorderOutput {
    /// Chunks not yet returned by [`Recorder::take_chunks`].
    pub chunks: Vec<EncodedChunk>,
    /// Video frames in the recording.
    pub video_frames: u64,
    /// Audio samples in the recording.
    pub audio_samples: u64,
}

/// Consumer of one session's combined stream.
///
/// Calls arrive in order: `start`, any number of `write_*`/`take_chunks`, then exactly one of
/// `stop` or `abort`. `abort` must tolerate repeated calls and calls after `stop`.
pub trait Recorder: Send {
    /// Prepare to accept stream data.
    fn start(&mut self) -> MergeResult<()>;
    /// Accept one captured frame.
    fn write_video(&mut self, frame: &VideoFrame) -> MergeResult<()>;
    /// Accept one block of audio samples.
    fn write_audio(&mut self, block: &AudioBlock) -> MergeResult<()>;
    /// Drain chunks encoded so far.
    fn take_chunks(&mut self) -> Vec<EncodedChunk>;
    /// Flush buffered data and finalize the container.
    fn stop(&mut self) -> MergeResult<RecorderOutput>;
    /// Discard everything recorded so far.
    fn abort(&mut self);
}

/// Host encoding capability: which formats can be recorded, and recorders for them.
pub trait MediaHost: Send + Sync {
    /// `true` when the host can record `codec`.
    fn is_type_supported(&self, codec: ContainerCodec) -> bool;
    /// Create a recorder for a negotiated codec.
    fn create_recorder(
        &self,
        codec: ContainerCodec,
        cfg: RecorderConfig,
    ) -> MergeResult<Box<dyn Recorder>>;
}

/// Places captured frames on a fixed-length timeline derived from the audio duration.
///
/// Gaps are filled by repeating the previous frame, late or duplicate frames are dropped and
/// frames past the end are discarded. [`FrameTimeline::finish`] pads the tail.
#[derive(Clone, Debug)]
pub struct FrameTimeline {
    total: u64,
    next: u64,
    last: Option<Raster>,
}

impl FrameTimeline {
    /// Timeline holding exactly `total` frames.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            next: 0,
            last: None,
        }
    }

    /// Frames the finished timeline holds.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Frames emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next
    }

    /// Place `frame`, emitting it (and any gap fill before it) in timeline order.
    pub fn place(
        &mut self,
        frame: &VideoFrame,
        mut emit: impl FnMut(&Raster) -> MergeResult<()>,
    ) -> MergeResult<()> {
        let idx = frame.index.0;
        if idx < self.next || self.next >= self.total {
            return Ok(());
        }
        let stop = idx.min(self.total);
        while self.next < stop {
            emit(self.last.as_ref().unwrap_or(&frame.raster))?;
            self.next += 1;
        }
        if idx < self.total {
            emit(&frame.raster)?;
            self.next += 1;
        }
        self.last = Some(frame.raster.clone());
        Ok(())
    }

    /// Repeat the last frame until the timeline is full.
    pub fn finish(&mut self, mut emit: impl FnMut(&Raster) -> MergeResult<()>) -> MergeResult<()> {
        if self.next >= self.total {
            return Ok(());
        }
        let Some(last) = self.last.take() else {
            return Err(MergeError::encoding_stalled(
                "no video frame was captured before the recording ended",
            ));
        };
        while self.next < self.total {
            emit(&last)?;
            self.next += 1;
        }
        self.last = Some(last);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/recorder.rs"]
mod tests;

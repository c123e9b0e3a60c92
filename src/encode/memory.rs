use crate::audio::playback::AudioBlock;
use crate::encode::codec::ContainerCodec;
use crate::encode::recorder::{
    EncodedChunk, FrameTimeline, MediaHost, Recorder, RecorderConfig, RecorderOutput,
};
use crate::foundation::core::{Fps, Raster};
use crate::foundation::error::{MergeError, MergeResult};
use crate::foundation::math::Fnv1a64;
use crate::render::compositor::VideoFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const MAGIC: &[u8; 8] = b"AVMRCAP1";
const HEADER_LEN: usize = 8 + 5 * 4;
const CHUNK_BYTES: usize = 4096;
const TAG_VIDEO: u8 = b'V';
const TAG_AUDIO: u8 = b'A';

#[derive(Debug, Default)]
struct HostCounters {
    created: AtomicUsize,
    started: AtomicUsize,
    stopped: AtomicUsize,
    aborted: AtomicUsize,
}

/// In-memory host for tests and debugging.
///
/// Recorders write a compact capture log (one record per frame and audio block) instead of
/// real media; [`CaptureLog::parse`] reads it back.
#[derive(Clone, Debug)]
pub struct InMemoryHost {
    supported: Vec<ContainerCodec>,
    stall: bool,
    counters: Arc<HostCounters>,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::supporting(ContainerCodec::DEFAULT_PREFERENCE)
    }
}

impl InMemoryHost {
    /// Host that supports every codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that supports only `codecs`.
    pub fn supporting(codecs: impl IntoIterator<Item = ContainerCodec>) -> Self {
        Self {
            supported: codecs.into_iter().collect(),
            stall: false,
            counters: Arc::default(),
        }
    }

    /// Make recorders accept data but never emit a chunk.
    pub fn with_stall(mut self, stall: bool) -> Self {
        self.stall = stall;
        self
    }

    /// Recorders created so far.
    pub fn recorders_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Recorders started so far.
    pub fn recorders_started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Recorders finalized with `stop`.
    pub fn recorders_stopped(&self) -> usize {
        self.counters.stopped.load(Ordering::SeqCst)
    }

    /// Recorders discarded with `abort` (counted once per recorder).
    pub fn recorders_aborted(&self) -> usize {
        self.counters.aborted.load(Ordering::SeqCst)
    }
}

impl MediaHost for InMemoryHost {
    fn is_type_supported(&self, codec: ContainerCodec) -> bool {
        self.supported.contains(&codec)
    }

    fn create_recorder(
        &self,
        codec: ContainerCodec,
        cfg: RecorderConfig,
    ) -> MergeResult<Box<dyn Recorder>> {
        if !self.is_type_supported(codec) {
            return Err(MergeError::codec_unavailable(format!(
                "in-memory host does not support {codec}"
            )));
        }
        cfg.validate()?;
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryRecorder {
            timeline: FrameTimeline::new(cfg.frame_count()),
            cfg,
            stall: self.stall,
            counters: Arc::clone(&self.counters),
            pending: Vec::new(),
            ready: Vec::new(),
            audio_samples: 0,
            state: RecState::Created,
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecState {
    Created,
    Recording,
    Stopped,
    Aborted,
}

struct InMemoryRecorder {
    cfg: RecorderConfig,
    timeline: FrameTimeline,
    stall: bool,
    counters: Arc<HostCounters>,
    pending: Vec<u8>,
    ready: Vec<EncodedChunk>,
    audio_samples: u64,
    state: RecState,
}

impl InMemoryRecorder {
    fn ensure_recording(&self) -> MergeResult<()> {
        if self.state != RecState::Recording {
            return Err(MergeError::validation(format!(
                "in-memory recorder is not recording ({:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn cut_chunks(&mut self, flush: bool) {
        if self.stall {
            self.pending.clear();
            return;
        }
        while self.pending.len() >= CHUNK_BYTES {
            let rest = self.pending.split_off(CHUNK_BYTES);
            let data = std::mem::replace(&mut self.pending, rest);
            self.ready.push(EncodedChunk { data });
        }
        if flush && !self.pending.is_empty() {
            let data = std::mem::take(&mut self.pending);
            self.ready.push(EncodedChunk { data });
        }
    }
}

impl Recorder for InMemoryRecorder {
    fn start(&mut self) -> MergeResult<()> {
        if self.state != RecState::Created {
            return Err(MergeError::validation("in-memory recorder already started"));
        }
        self.pending.extend_from_slice(MAGIC);
        for v in [
            self.cfg.width,
            self.cfg.height,
            self.cfg.fps.num,
            self.cfg.fps.den,
            self.cfg.sample_rate,
        ] {
            self.pending.extend_from_slice(&v.to_le_bytes());
        }
        self.state = RecState::Recording;
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_video(&mut self, frame: &VideoFrame) -> MergeResult<()> {
        self.ensure_recording()?;
        if frame.raster.size() != (self.cfg.width, self.cfg.height) {
            return Err(MergeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.raster.width, frame.raster.height, self.cfg.width, self.cfg.height
            )));
        }
        let pending = &mut self.pending;
        self.timeline.place(frame, |raster| {
            push_frame_record(pending, raster);
            Ok(())
        })?;
        self.cut_chunks(false);
        Ok(())
    }

    fn write_audio(&mut self, block: &AudioBlock) -> MergeResult<()> {
        self.ensure_recording()?;
        let count = u32::try_from(block.samples.len())
            .map_err(|_| MergeError::validation("audio block too large"))?;
        self.pending.push(TAG_AUDIO);
        self.pending.extend_from_slice(&block.first_sample.to_le_bytes());
        self.pending.extend_from_slice(&count.to_le_bytes());
        self.audio_samples += u64::from(count);
        self.cut_chunks(false);
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<EncodedChunk> {
        std::mem::take(&mut self.ready)
    }

    fn stop(&mut self) -> MergeResult<RecorderOutput> {
        self.ensure_recording()?;
        let pending = &mut self.pending;
        self.timeline.finish(|raster| {
            push_frame_record(pending, raster);
            Ok(())
        })?;
        self.cut_chunks(true);
        self.state = RecState::Stopped;
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(RecorderOutput {
            chunks: std::mem::take(&mut self.ready),
            video_frames: self.timeline.emitted(),
            audio_samples: self.audio_samples,
        })
    }

    fn abort(&mut self) {
        if matches!(self.state, RecState::Aborted | RecState::Stopped) {
            return;
        }
        self.pending.clear();
        self.ready.clear();
        self.state = RecState::Aborted;
        self.counters.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

fn push_frame_record(out: &mut Vec<u8>, raster: &Raster) {
    let mut h = Fnv1a64::new_default();
    h.write_u64((u64::from(raster.width) << 32) | u64::from(raster.height));
    h.write_bytes(&raster.data);
    out.push(TAG_VIDEO);
    out.extend_from_slice(&h.finish().to_le_bytes());
}

/// Decoded capture log written by [`InMemoryHost`] recorders.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureLog {
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Nominal frame rate.
    pub fps: Fps,
    /// Audio sample rate.
    pub sample_rate: u32,
    /// FNV-1a digest of every frame, in timeline order.
    pub frame_digests: Vec<u64>,
    /// Audio samples recorded.
    pub audio_samples: u64,
}

impl CaptureLog {
    /// Parse concatenated chunk bytes.
    pub fn parse(bytes: &[u8]) -> MergeResult<Self> {
        let bad = |msg: &str| MergeError::validation(format!("capture log: {msg}"));
        if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
            return Err(bad("missing header"));
        }
        let u32_at = |off: usize| -> u32 {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[off..off + 4]);
            u32::from_le_bytes(b)
        };
        let fps = Fps::new(u32_at(16), u32_at(20))?;
        let mut log = Self {
            width: u32_at(8),
            height: u32_at(12),
            fps,
            sample_rate: u32_at(24),
            frame_digests: Vec::new(),
            audio_samples: 0,
        };

        let mut rest = &bytes[HEADER_LEN..];
        while let Some((&tag, body)) = rest.split_first() {
            match tag {
                TAG_VIDEO if body.len() >= 8 => {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(&body[..8]);
                    log.frame_digests.push(u64::from_le_bytes(b));
                    rest = &body[8..];
                }
                TAG_AUDIO if body.len() >= 12 => {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(&body[8..12]);
                    log.audio_samples += u64::from(u32::from_le_bytes(b));
                    rest = &body[12..];
                }
                _ => return Err(bad("truncated or unknown record")),
            }
        }
        Ok(log)
    }

    /// Duration of the recorded audio.
    pub fn audio_duration(&self) -> Duration {
        Duration::from_secs_f64(self.audio_samples as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// Duration of the recorded video at the nominal rate.
    pub fn video_duration(&self) -> Duration {
        Duration::from_secs_f64(self.fps.frames_to_secs(self.frame_digests.len() as u64))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/memory.rs"]
mod tests;

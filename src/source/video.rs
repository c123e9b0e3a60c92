use super::{FrameSource, SourceKind};
use crate::assets::media::{VideoSourceInfo, decode_video_frames, probe_video};
use crate::foundation::core::Raster;
use crate::foundation::error::{MergeError, MergeResult};
use anyhow::Context as _;
use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

/// Natural properties of a decodable video.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
    /// Native duration of one pass through the clip.
    pub duration: Duration,
}

/// Random-access frame decoder behind a [`LoopingVideo`].
pub trait VideoDecoder: Send {
    /// Natural size and duration.
    fn info(&self) -> VideoInfo;

    /// Decode the frame shown at `position` (always `< info().duration`).
    fn frame_at(&mut self, position: Duration) -> MergeResult<Raster>;

    /// Release the decode pipeline. Must tolerate repeated calls.
    fn close(&mut self) {}
}

/// A video played from zero and restarted transparently whenever it runs out.
pub struct LoopingVideo {
    decoder: Box<dyn VideoDecoder>,
    info: VideoInfo,
    playing: bool,
    released: bool,
    cycle: u64,
    restarts: u64,
    current: Option<Raster>,
}

impl LoopingVideo {
    /// Wrap a decoder, rejecting sources without a usable size or duration.
    pub fn new(decoder: impl VideoDecoder + 'static) -> MergeResult<Self> {
        let info = decoder.info();
        if info.width == 0 || info.height == 0 {
            return Err(MergeError::visual_unavailable(format!(
                "video has invalid natural size {}x{}",
                info.width, info.height
            )));
        }
        if info.duration.is_zero() {
            return Err(MergeError::visual_unavailable("video has zero duration"));
        }
        Ok(Self {
            decoder: Box::new(decoder),
            info,
            playing: false,
            released: false,
            cycle: 0,
            restarts: 0,
            current: None,
        })
    }

    /// Open a video file through `ffprobe`/`ffmpeg`.
    pub fn open(path: &Path) -> MergeResult<Self> {
        Self::new(FfmpegVideoDecoder::open(path)?)
    }

    /// Natural properties of the wrapped video.
    pub fn info(&self) -> VideoInfo {
        self.info
    }
}

impl FrameSource for LoopingVideo {
    fn kind(&self) -> SourceKind {
        SourceKind::LoopingVideo
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn start(&mut self) -> MergeResult<()> {
        if self.released {
            return Err(MergeError::visual_unavailable(
                "video source has already been released",
            ));
        }
        self.cycle = 0;
        self.restarts = 1;
        self.current = Some(self.decoder.frame_at(Duration::ZERO)?);
        self.playing = true;
        Ok(())
    }

    fn current_frame(&mut self, elapsed: Duration) -> MergeResult<&Raster> {
        if !self.playing {
            return Err(MergeError::validation("video frame requested before start"));
        }

        let clip = self.info.duration.as_secs_f64();
        let t = elapsed.as_secs_f64();
        let cycle = (t / clip).floor() as u64;
        if cycle > self.cycle {
            self.restarts += cycle - self.cycle;
            self.cycle = cycle;
            tracing::debug!(restarts = self.restarts, "video reached its end, restarting");
        }

        let position = (t - (cycle as f64) * clip).clamp(0.0, clip);
        let position = Duration::from_secs_f64(position).min(self.info.duration);
        let position = if position == self.info.duration {
            Duration::ZERO
        } else {
            position
        };
        let frame = self.decoder.frame_at(position)?;
        Ok(self.current.insert(frame))
    }

    fn stop(&mut self) {
        if self.released {
            return;
        }
        self.playing = false;
        self.released = true;
        self.current = None;
        self.decoder.close();
    }

    fn restarts(&self) -> u64 {
        self.restarts
    }
}

/// Frames decoded per `ffmpeg` invocation.
const DECODE_BATCH_FRAMES: u32 = 30;

/// [`VideoDecoder`] backed by the system `ffmpeg`, decoding in batches.
pub struct FfmpegVideoDecoder {
    source: VideoSourceInfo,
    cache_start: u64,
    cache: Vec<Raster>,
    spool: Option<tempfile::NamedTempFile>,
}

impl FfmpegVideoDecoder {
    /// Probe a video file on disk.
    pub fn open(path: &Path) -> MergeResult<Self> {
        Ok(Self {
            source: probe_video(path)?,
            cache_start: 0,
            cache: Vec::new(),
            spool: None,
        })
    }

    /// Spool an in-memory video to a temporary file and probe it.
    pub fn from_bytes(bytes: &[u8]) -> MergeResult<Self> {
        let mut spool = tempfile::Builder::new()
            .prefix("avmerge_video_")
            .tempfile()
            .context("create temporary video file")?;
        spool
            .write_all(bytes)
            .and_then(|()| spool.flush())
            .context("write temporary video file")?;
        let mut decoder = Self::open(spool.path())?;
        decoder.spool = Some(spool);
        Ok(decoder)
    }

    fn cached(&self, idx: u64) -> Option<&Raster> {
        let off = idx.checked_sub(self.cache_start)?;
        self.cache.get(usize::try_from(off).ok()?)
    }
}

impl VideoDecoder for FfmpegVideoDecoder {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            width: self.source.width,
            height: self.source.height,
            duration: Duration::from_secs_f64(self.source.duration_sec),
        }
    }

    fn frame_at(&mut self, position: Duration) -> MergeResult<Raster> {
        let idx = self.source.frame_index_at(position.as_secs_f64());
        if let Some(frame) = self.cached(idx) {
            return Ok(frame.clone());
        }

        let start_sec = idx as f64 / self.source.source_fps();
        let frames = decode_video_frames(&self.source, start_sec, DECODE_BATCH_FRAMES)?;
        if frames.is_empty() {
            // Container durations can overshoot the last decodable frame.
            return self.cache.last().cloned().ok_or_else(|| {
                MergeError::visual_unavailable(format!(
                    "ffmpeg returned no frames at {start_sec:.3}s for '{}'",
                    self.source.source_path.display()
                ))
            });
        }
        tracing::trace!(idx, frames = frames.len(), "decoded video batch");
        self.cache_start = idx;
        self.cache = frames;
        Ok(self.cache[0].clone())
    }

    fn close(&mut self) {
        self.cache.clear();
        self.spool = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/video.rs"]
mod tests;

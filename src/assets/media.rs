use crate::foundation::core::Raster;
use crate::foundation::error::{MergeError, MergeResult};
use std::path::{Path, PathBuf};

/// Container-level facts about a video resource, as reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSourceInfo {
    /// Path of the probed file.
    pub source_path: PathBuf,
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
    /// Frame-rate numerator.
    pub fps_num: u32,
    /// Frame-rate denominator.
    pub fps_den: u32,
    /// Native duration in seconds.
    pub duration_sec: f64,
}

impl VideoSourceInfo {
    /// Source frame rate as a float, `0.0` when unknown.
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    /// Number of whole frames the source holds (at least one for a playable file).
    pub fn frame_count(&self) -> u64 {
        ((self.duration_sec * self.source_fps()).floor() as u64).max(1)
    }

    /// Source frame shown at `position_sec` into the clip.
    pub fn frame_index_at(&self, position_sec: f64) -> u64 {
        let idx = (position_sec.max(0.0) * self.source_fps()).floor() as u64;
        idx.min(self.frame_count() - 1)
    }
}

/// Probe natural size, frame rate and duration of a video file.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> MergeResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| MergeError::visual_unavailable(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(MergeError::visual_unavailable(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| MergeError::visual_unavailable(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MergeError::visual_unavailable("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| MergeError::visual_unavailable("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| MergeError::visual_unavailable("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| MergeError::visual_unavailable("invalid video r_frame_rate"))?;
    let duration_sec = video_stream
        .duration
        .as_ref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_ref()))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    if duration_sec <= 0.0 || !duration_sec.is_finite() {
        return Err(MergeError::visual_unavailable(format!(
            "video '{}' reports no usable duration",
            source_path.display()
        )));
    }

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
    })
}

/// Probe natural size, frame rate and duration of a video file.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &Path) -> MergeResult<VideoSourceInfo> {
    Err(MergeError::visual_unavailable(
        "video sources require the 'media-ffmpeg' feature",
    ))
}

/// Decode up to `frame_count` consecutive frames starting at `start_time_sec`.
///
/// Frames come back premultiplied; fewer frames than requested are returned near the end
/// of the clip.
#[cfg(feature = "media-ffmpeg")]
pub fn decode_video_frames(
    source: &VideoSourceInfo,
    start_time_sec: f64,
    frame_count: u32,
) -> MergeResult<Vec<Raster>> {
    if frame_count == 0 {
        return Ok(Vec::new());
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{start_time_sec:.9}")])
        .arg("-i")
        .arg(&source.source_path)
        .args([
            "-an",
            "-frames:v",
            &frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| {
            MergeError::visual_unavailable(format!("failed to run ffmpeg for video decode: {e}"))
        })?;

    if !out.status.success() {
        return Err(MergeError::visual_unavailable(format!(
            "ffmpeg video decode batch failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = source.width as usize * source.height as usize * 4;
    if expected_len == 0 {
        return Err(MergeError::visual_unavailable(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if !out.stdout.len().is_multiple_of(expected_len) {
        return Err(MergeError::visual_unavailable(format!(
            "decoded video batch has invalid size: got {} bytes, expected multiples of {expected_len}",
            out.stdout.len()
        )));
    }

    let available = (out.stdout.len() / expected_len).min(frame_count as usize);
    let mut frames = Vec::with_capacity(available);
    for chunk in out.stdout.chunks_exact(expected_len).take(available) {
        let mut px = chunk.to_vec();
        crate::foundation::math::premultiply_rgba8_in_place(&mut px);
        frames.push(Raster::new(source.width, source.height, px)?);
    }
    Ok(frames)
}

/// Decode up to `frame_count` consecutive frames starting at `start_time_sec`.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frames(
    _source: &VideoSourceInfo,
    _start_time_sec: f64,
    _frame_count: u32,
) -> MergeResult<Vec<Raster>> {
    Err(MergeError::visual_unavailable(
        "video sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 || a == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;

use crate::foundation::error::{MergeError, MergeResult};
use std::sync::Arc;
use std::time::Duration;

/// 0-based frame index on the recording timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Nominal capture rate of the compositor.
    pub const DEFAULT: Fps = Fps { num: 30, den: 1 };

    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> MergeResult<Self> {
        if den == 0 {
            return Err(MergeError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MergeError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Duration of one frame.
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs_f64(self.frame_duration_secs())
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Frame index nearest to `elapsed` on this rate's grid.
    pub fn frame_at(self, elapsed: Duration) -> FrameIndex {
        FrameIndex((elapsed.as_secs_f64() * self.as_f64()).round().max(0.0) as u64)
    }

    /// Number of frames needed to cover `samples` audio samples at `sample_rate`.
    ///
    /// Exact integer ceiling, so a recording never ends before its audio does.
    pub fn frames_covering_samples(self, samples: u64, sample_rate: u32) -> u64 {
        if sample_rate == 0 {
            return 0;
        }
        let num = u128::from(samples) * u128::from(self.num);
        let den = u128::from(sample_rate) * u128::from(self.den);
        num.div_ceil(den) as u64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Clamp pixel dimensions down to the nearest even values.
///
/// Most encoders (yuv420p in particular) reject odd frame sizes.
pub fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width - width % 2, height - height % 2)
}

/// A decoded frame as premultiplied RGBA8 pixels.
///
/// Pixel data is shared, so cloning a raster is cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes, tightly packed, row-major.
    pub data: Arc<[u8]>,
}

impl Raster {
    /// Wrap premultiplied RGBA8 pixels, checking the buffer length.
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> MergeResult<Self> {
        let data = data.into();
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(MergeError::validation(format!(
                "raster data size mismatch: got {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A raster filled with one straight-alpha RGBA8 color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let px = crate::foundation::math::premultiply_px(rgba);
        let len = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(len * 4);
        for _ in 0..len {
            data.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// Pixel dimensions as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `true` when every pixel is fully transparent (nothing was drawn).
    pub fn is_blank(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

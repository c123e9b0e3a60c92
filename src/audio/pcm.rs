use crate::foundation::error::{MergeError, MergeResult};
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;

/// Sample rate of the upstream generator's PCM output.
pub const PCM_SAMPLE_RATE: u32 = 24_000;

/// Mono audio normalized to `[-1, 1)`, immutable once decoded.
///
/// Cloning shares the sample buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSample {
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl AudioSample {
    /// Wrap already-normalized mono samples.
    pub fn from_samples(sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> MergeResult<Self> {
        if sample_rate == 0 {
            return Err(MergeError::malformed_audio("sample rate must be non-zero"));
        }
        Ok(Self {
            sample_rate,
            samples: samples.into(),
        })
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when the sample holds no audio at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow the normalized samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Playback duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Largest absolute amplitude, `0.0` for empty audio.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

/// Decode a base64 string of 16-bit little-endian mono PCM at [`PCM_SAMPLE_RATE`].
///
/// Whitespace (line wrapping) inside the base64 payload is ignored.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn decode_pcm_base64(input: &str) -> MergeResult<AudioSample> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| MergeError::malformed_audio(format!("audio is not valid base64: {e}")))?;
    decode_pcm_s16le(&bytes)
}

/// Decode raw 16-bit little-endian mono PCM bytes at [`PCM_SAMPLE_RATE`].
pub fn decode_pcm_s16le(bytes: &[u8]) -> MergeResult<AudioSample> {
    if looks_like_wav(bytes) {
        return Err(MergeError::malformed_audio(
            "expected raw s16le PCM but found a RIFF/WAVE container",
        ));
    }
    if !bytes.len().is_multiple_of(2) {
        return Err(MergeError::malformed_audio(format!(
            "PCM byte length {} is odd (2 bytes per sample)",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();
    tracing::debug!(samples = samples.len(), "decoded pcm");
    AudioSample::from_samples(PCM_SAMPLE_RATE, samples)
}

fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

#[cfg(test)]
#[path = "../../tests/unit/audio/pcm.rs"]
mod tests;

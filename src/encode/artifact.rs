use crate::encode::codec::ContainerCodec;
use crate::foundation::core::Fps;
use std::time::Duration;

/// The single encoded file produced by a successful session.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedArtifact {
    /// Encoded container bytes.
    pub bytes: Vec<u8>,
    /// Negotiated container/codec.
    pub codec: ContainerCodec,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub fps: Fps,
    /// Recorded duration; equals the audio duration.
    pub duration: Duration,
    /// Video frames in the recording.
    pub video_frames: u64,
    /// Audio samples in the recording.
    pub audio_samples: u64,
    /// Times the visual source (re)started from zero.
    pub source_restarts: u64,
}

impl EncodedArtifact {
    /// MIME type of [`EncodedArtifact::bytes`].
    pub fn mime_type(&self) -> &'static str {
        self.codec.mime_type()
    }

    /// Download file extension.
    pub fn extension(&self) -> &'static str {
        self.codec.extension()
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` when there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Serializable summary, without the payload.
    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            codec: self.codec,
            mime_type: self.mime_type().to_owned(),
            width: self.width,
            height: self.height,
            fps: self.fps,
            duration_secs: self.duration.as_secs_f64(),
            video_frames: self.video_frames,
            audio_samples: self.audio_samples,
            source_restarts: self.source_restarts,
            size_bytes: self.bytes.len() as u64,
            sha256: None,
        }
    }
}

/// JSON manifest describing an [`EncodedArtifact`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactInfo {
    /// Negotiated container/codec.
    pub codec: ContainerCodec,
    /// MIME type.
    pub mime_type: String,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub fps: Fps,
    /// Recorded duration in seconds.
    pub duration_secs: f64,
    /// Video frames in the recording.
    pub video_frames: u64,
    /// Audio samples in the recording.
    pub audio_samples: u64,
    /// Times the visual source (re)started from zero.
    pub source_restarts: u64,
    /// Payload size.
    pub size_bytes: u64,
    /// Hex SHA-256 of the payload, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

use crate::encode::recorder::MediaHost;
use crate::foundation::error::{MergeError, MergeResult};
use std::fmt;
use std::str::FromStr;

/// A container plus the video/audio codecs recorded into it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerCodec {
    /// MP4 with H.264 video and AAC audio. Plays nearly everywhere.
    Mp4H264,
    /// Matroska/WebM-family container with H.264 video and Opus audio.
    WebmH264,
    /// WebM with VP9 video and Opus audio. Baseline open format.
    WebmVp9,
}

impl ContainerCodec {
    /// Probe order used when the caller does not override it.
    pub const DEFAULT_PREFERENCE: [ContainerCodec; 3] = [
        ContainerCodec::Mp4H264,
        ContainerCodec::WebmH264,
        ContainerCodec::WebmVp9,
    ];

    /// MIME type including codec parameters.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4H264 => "video/mp4",
            Self::WebmH264 => "video/x-matroska;codecs=avc1,opus",
            Self::WebmVp9 => "video/webm;codecs=vp9,opus",
        }
    }

    /// File extension (without dot) for downloads.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4H264 => "mp4",
            Self::WebmH264 => "mkv",
            Self::WebmVp9 => "webm",
        }
    }

    /// Short stable name, also accepted by [`ContainerCodec::from_str`].
    pub fn label(self) -> &'static str {
        match self {
            Self::Mp4H264 => "mp4",
            Self::WebmH264 => "webm-h264",
            Self::WebmVp9 => "webm-vp9",
        }
    }

    /// `ffmpeg` video encoder name.
    pub fn video_encoder(self) -> &'static str {
        match self {
            Self::Mp4H264 | Self::WebmH264 => "libx264",
            Self::WebmVp9 => "libvpx-vp9",
        }
    }

    /// `ffmpeg` audio encoder name.
    pub fn audio_encoder(self) -> &'static str {
        match self {
            Self::Mp4H264 => "aac",
            Self::WebmH264 | Self::WebmVp9 => "libopus",
        }
    }

    /// `ffmpeg` muxer name.
    pub fn muxer(self) -> &'static str {
        match self {
            Self::Mp4H264 => "mp4",
            Self::WebmH264 => "matroska",
            Self::WebmVp9 => "webm",
        }
    }
}

impl fmt::Display for ContainerCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for ContainerCodec {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::DEFAULT_PREFERENCE
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                MergeError::validation(format!(
                    "unknown codec '{s}' (expected one of: mp4, webm-h264, webm-vp9)"
                ))
            })
    }
}

/// Pick the first entry of `preference` the host can record.
pub fn negotiate(host: &dyn MediaHost, preference: &[ContainerCodec]) -> MergeResult<ContainerCodec> {
    for &codec in preference {
        if host.is_type_supported(codec) {
            tracing::debug!(codec = codec.label(), "negotiated container/codec");
            return Ok(codec);
        }
        tracing::debug!(codec = codec.label(), "container/codec not supported by host");
    }
    let tried: Vec<&str> = preference.iter().map(|c| c.label()).collect();
    Err(MergeError::codec_unavailable(format!(
        "host supports none of [{}]",
        tried.join(", ")
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/codec.rs"]
mod tests;

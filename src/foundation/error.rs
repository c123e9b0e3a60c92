/// Convenience result type used across avmerge.
pub type MergeResult<T> = Result<T, MergeError>;

/// Top-level error taxonomy surfaced by the compositing pipeline.
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    /// The PCM payload is not valid 16-bit little-endian mono audio.
    #[error("malformed audio input: {0}")]
    MalformedAudioInput(String),

    /// The still image or video could not be loaded or decoded.
    #[error("visual source unavailable: {0}")]
    VisualSourceUnavailable(String),

    /// No supported container/codec combination exists on the host.
    #[error("codec unavailable: {0}")]
    CodecUnavailable(String),

    /// Recording ran to completion without producing any encoded data.
    #[error("encoding stalled: {0}")]
    EncodingStalled(String),

    /// The caller aborted the session.
    #[error("session cancelled")]
    Cancelled,

    /// Internal contract violation (bad options, illegal state transition, missing track).
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse grouping of [`MergeError`] for user-facing decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The inputs are bad; retrying with the same inputs will fail again.
    FixInput,
    /// Host or encoder trouble; retry or choose another format.
    Retry,
    /// Not a failure: the caller stopped the session.
    Cancelled,
    /// Bug or IO failure inside the pipeline.
    Internal,
}

impl MergeError {
    /// Build a [`MergeError::MalformedAudioInput`] value.
    pub fn malformed_audio(msg: impl Into<String>) -> Self {
        Self::MalformedAudioInput(msg.into())
    }

    /// Build a [`MergeError::VisualSourceUnavailable`] value.
    pub fn visual_unavailable(msg: impl Into<String>) -> Self {
        Self::VisualSourceUnavailable(msg.into())
    }

    /// Build a [`MergeError::CodecUnavailable`] value.
    pub fn codec_unavailable(msg: impl Into<String>) -> Self {
        Self::CodecUnavailable(msg.into())
    }

    /// Build a [`MergeError::EncodingStalled`] value.
    pub fn encoding_stalled(msg: impl Into<String>) -> Self {
        Self::EncodingStalled(msg.into())
    }

    /// Build a [`MergeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Classify the error for callers deciding what to tell the user.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedAudioInput(_) | Self::VisualSourceUnavailable(_) => ErrorClass::FixInput,
            Self::CodecUnavailable(_) | Self::EncodingStalled(_) => ErrorClass::Retry,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Validation(_) | Self::Other(_) => ErrorClass::Internal,
        }
    }

    /// `true` for caller-initiated aborts.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

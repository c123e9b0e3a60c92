//! Visual asset loading: still images and video probing/decoding.

/// Still-image decoding.
pub mod decode;
/// Video probing and frame decoding through `ffprobe`/`ffmpeg`.
pub mod media;

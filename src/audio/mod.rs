//! Audio side of the pipeline: PCM decoding and the playback clock.

/// Raw PCM decoding into [`pcm::AudioSample`].
pub mod pcm;
/// Real-time playback of an [`pcm::AudioSample`] into an audio track.
pub mod playback;

use crate::audio::playback::{AudioBlock, AudioTrack};
use crate::foundation::core::Fps;
use crate::foundation::error::{MergeError, MergeResult};
use crate::render::compositor::{VideoFrame, VideoTrack};

/// One item of the combined stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
    /// A captured surface frame.
    Video(VideoFrame),
    /// A block of played-back audio.
    Audio(AudioBlock),
}

/// Exactly one video track and one audio track, consumed as a single stream.
#[derive(Debug)]
pub struct CombinedStream {
    video: VideoTrack,
    audio: AudioTrack,
    video_open: bool,
    audio_open: bool,
}

impl CombinedStream {
    /// Bind both tracks. Fails when either is absent.
    pub fn combine(video: Option<VideoTrack>, audio: Option<AudioTrack>) -> MergeResult<Self> {
        match (video, audio) {
            (Some(video), Some(audio)) => Ok(Self {
                video,
                audio,
                video_open: true,
                audio_open: true,
            }),
            (None, _) => Err(MergeError::validation("combined stream requires a video track")),
            (_, None) => Err(MergeError::validation("combined stream requires an audio track")),
        }
    }

    /// Frame size of the video track.
    pub fn video_size(&self) -> (u32, u32) {
        self.video.size()
    }

    /// Nominal frame rate of the video track.
    pub fn fps(&self) -> Fps {
        self.video.fps()
    }

    /// Sample rate of the audio track.
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate()
    }

    /// Next item from either track, audio first when both are ready.
    ///
    /// Returns `None` once both tracks are closed.
    pub async fn next(&mut self) -> Option<StreamItem> {
        loop {
            if !self.video_open && !self.audio_open {
                return None;
            }
            tokio::select! {
                biased;
                block = self.audio.recv(), if self.audio_open => match block {
                    Some(block) => return Some(StreamItem::Audio(block)),
                    None => self.audio_open = false,
                },
                frame = self.video.recv(), if self.video_open => match frame {
                    Some(frame) => return Some(StreamItem::Video(frame)),
                    None => self.video_open = false,
                },
            }
        }
    }

    /// Next item that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<StreamItem> {
        if let Some(block) = self.audio.try_recv() {
            return Some(StreamItem::Audio(block));
        }
        self.video.try_recv().map(StreamItem::Video)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/mux.rs"]
mod tests;

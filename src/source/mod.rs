//! Frame sources: the visual input redrawn by the compositor every tick.

mod still;
mod video;

pub use still::StillImage;
pub use video::{FfmpegVideoDecoder, LoopingVideo, VideoDecoder, VideoInfo};

use crate::foundation::core::Raster;
use crate::foundation::error::MergeResult;
use std::time::Duration;

/// Which kind of visual input a session composites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// A single decoded image.
    StillImage,
    /// A video that restarts from zero whenever it runs out.
    LoopingVideo,
}

/// Capability set shared by still images and looping videos.
///
/// `elapsed` passed to [`FrameSource::current_frame`] is measured from [`FrameSource::start`]
/// on the compositor clock.
pub trait FrameSource: Send {
    /// Kind of source, used for progress reporting.
    fn kind(&self) -> SourceKind;

    /// Natural pixel size of the source `(width, height)`.
    fn natural_size(&self) -> (u32, u32);

    /// Begin playback from position zero.
    fn start(&mut self) -> MergeResult<()>;

    /// Frame visible `elapsed` after start.
    fn current_frame(&mut self, elapsed: Duration) -> MergeResult<&Raster>;

    /// Halt playback and release decode resources. Must tolerate repeated calls.
    fn stop(&mut self);

    /// Number of times playback (re)started from position zero, including the initial start.
    fn restarts(&self) -> u64 {
        0
    }
}

use super::{FrameSource, SourceKind};
use crate::assets::decode::decode_image_payload;
use crate::foundation::core::Raster;
use crate::foundation::error::MergeResult;
use std::time::Duration;

/// One decoded raster, returned unchanged on every tick.
#[derive(Clone, Debug)]
pub struct StillImage {
    raster: Raster,
}

impl StillImage {
    /// Wrap an already decoded raster.
    pub fn new(raster: Raster) -> Self {
        Self { raster }
    }

    /// Decode raw image bytes, bare base64 or a `data:` URL.
    pub fn decode(payload: &[u8]) -> MergeResult<Self> {
        Ok(Self::new(decode_image_payload(payload)?))
    }

    /// Borrow the decoded raster.
    pub fn raster(&self) -> &Raster {
        &self.raster
    }
}

impl FrameSource for StillImage {
    fn kind(&self) -> SourceKind {
        SourceKind::StillImage
    }

    fn natural_size(&self) -> (u32, u32) {
        self.raster.size()
    }

    fn start(&mut self) -> MergeResult<()> {
        Ok(())
    }

    fn current_frame(&mut self, _elapsed: Duration) -> MergeResult<&Raster> {
        Ok(&self.raster)
    }

    fn stop(&mut self) {}
}

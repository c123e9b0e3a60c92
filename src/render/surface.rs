use crate::foundation::core::{Raster, even_dimensions};
use crate::foundation::error::{MergeError, MergeResult};

/// Mutable premultiplied RGBA8 buffer with even pixel dimensions.
#[derive(Clone, Debug)]
pub struct RenderSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RenderSurface {
    /// Allocate a surface for a source of the given natural size, clamped to even dimensions.
    pub fn for_source(natural: (u32, u32)) -> MergeResult<Self> {
        let (width, height) = even_dimensions(natural.0, natural.1);
        if width == 0 || height == 0 {
            return Err(MergeError::visual_unavailable(format!(
                "visual source {}x{} is too small to encode",
                natural.0, natural.1
            )));
        }
        Ok(Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        })
    }

    /// Surface width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Surface height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Surface size as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draw `src` stretched over the whole surface (nearest-neighbour).
    pub fn draw(&mut self, src: &Raster) {
        if src.size() == self.size() {
            self.data.copy_from_slice(&src.data);
            return;
        }
        if src.width == 0 || src.height == 0 {
            self.data.fill(0);
            return;
        }

        let dst_w = self.width as usize;
        let src_w = src.width as usize;
        let x_map: Vec<usize> = (0..dst_w)
            .map(|x| (x * src_w / dst_w).min(src_w - 1) * 4)
            .collect();
        for (y, row) in self.data.chunks_exact_mut(dst_w * 4).enumerate() {
            let sy = (y as u64 * u64::from(src.height) / u64::from(self.height)) as usize;
            let src_row = &src.data[sy * src_w * 4..(sy + 1) * src_w * 4];
            for (px, &sx) in row.chunks_exact_mut(4).zip(&x_map) {
                px.copy_from_slice(&src_row[sx..sx + 4]);
            }
        }
    }

    /// Copy the current contents out as an immutable [`Raster`].
    pub fn snapshot(&self) -> Raster {
        Raster {
            width: self.width,
            height: self.height,
            data: self.data.as_slice().into(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;

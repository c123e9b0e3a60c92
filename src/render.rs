//! Render surface and the compositor draw loop that feeds the video track.

/// The periodic draw loop and its capturable video track.
pub mod compositor;
/// Fixed-size raster the compositor draws into.
pub mod surface;

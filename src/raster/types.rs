//! Core types for page rasterization

use crate::analysis::PageIndex;

/// One rasterized document page.
///
/// RGB pixel data plus the dimensions it was decoded at. Produced lazily by
/// the rasterizer, cached for the lifetime of the current document and
/// invalidated when the source changes.
#[derive(Clone)]
pub struct RenderedPage {
    /// 1-based page index
    pub index: PageIndex,
    /// Raw RGB pixel data (3 bytes per pixel: R, G, B)
    pub pixels: Vec<u8>,
    /// Raster width in pixels
    pub width_px: u32,
    /// Raster height in pixels
    pub height_px: u32,
    /// Scale the page was rasterized at (1.0 for raster sources)
    pub scale: f32,
}

impl std::fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPage")
            .field("index", &self.index)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("scale", &self.scale)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

//! Rec.601 luma conversion.

use tracing::debug;

use crate::raster::{PixelFormat, RasterBuffer};
use crate::Result;

/// Convert a raster to grayscale using `round(0.299 R + 0.587 G + 0.114 B)`.
///
/// The pixel format is preserved: RGBA input stays RGBA with the luma value
/// replicated into R, G and B and the alpha channel untouched; Gray8 input
/// passes through unchanged. The transform is a projection, so applying it
/// twice is bit-for-bit identical to applying it once.
pub fn to_grayscale(buffer: RasterBuffer) -> Result<RasterBuffer> {
    let (width, height) = buffer.dimensions();
    match buffer.format() {
        PixelFormat::Gray8 => Ok(buffer),
        PixelFormat::Rgba8 => {
            debug!(width, height, "Converting raster to grayscale");
            let mut data = buffer.into_data();
            for px in data.chunks_exact_mut(4) {
                let gray = luma(px[0], px[1], px[2]);
                px[0] = gray;
                px[1] = gray;
                px[2] = gray;
                // px[3] (alpha) preserved
            }
            RasterBuffer::new(width, height, PixelFormat::Rgba8, data)
        }
    }
}

/// Weighted Rec.601 luma, rounded to the nearest integer.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)).round() as u8
}

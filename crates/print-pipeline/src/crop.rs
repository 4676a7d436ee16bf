//! Aspect-locked crop resolution and fixed-resolution rendering.
//!
//! The crop selection happens in display coordinates (a zoomed/panned view of
//! the source). `resolve_crop` maps that rectangle into source pixel space,
//! re-locks it to the 596/832 aspect ratio and clamps it into the source
//! bounds. `render` then samples the (fractional) region into a buffer of
//! exactly the target resolution using bilinear filtering.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::raster::RasterBuffer;
use crate::{PipelineError, Result, TARGET_ASPECT};

/// Smallest usable crop edge in source pixels.
const MIN_CROP_PX: f64 = 1.0;

/// A rectangle in display (rendered view) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A finalized crop rectangle in source pixel coordinates.
///
/// Width over height always equals the target aspect ratio, and the
/// rectangle lies fully inside the source image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    /// Width-over-height ratio of the region.
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// Map a display-space selection into a source-space crop region.
///
/// `scale_x`/`scale_y` convert display pixels to source pixels (source
/// dimension divided by displayed dimension). The caller is expected to only
/// offer aspect-locked rectangles; the region is re-locked to 596/832 and
/// clamped into the source bounds regardless, shrinking while keeping the
/// aspect when the scaled rectangle overflows the image.
pub fn resolve_crop(
    display: RectF,
    scale_x: f64,
    scale_y: f64,
    source_w: u32,
    source_h: u32,
) -> Result<CropRegion> {
    let sw = f64::from(source_w);
    let sh = f64::from(source_h);

    let scaled_x = display.x * scale_x;
    let scaled_y = display.y * scale_y;
    let scaled_w = display.width * scale_x;

    if !scaled_x.is_finite() || !scaled_y.is_finite() || !scaled_w.is_finite() {
        return Err(PipelineError::CropOutOfBounds(format!(
            "non-finite selection {display:?}"
        )));
    }

    // Re-lock the aspect from the scaled width, then shrink to fit.
    let mut width = scaled_w;
    let mut height = width / TARGET_ASPECT;
    if width > sw {
        width = sw;
        height = width / TARGET_ASPECT;
    }
    if height > sh {
        height = sh;
        width = height * TARGET_ASPECT;
    }

    if width < MIN_CROP_PX || height < MIN_CROP_PX {
        return Err(PipelineError::CropOutOfBounds(format!(
            "source {source_w}x{source_h} cannot fit a {width:.2}x{height:.2} crop"
        )));
    }

    let x = scaled_x.clamp(0.0, sw - width);
    let y = scaled_y.clamp(0.0, sh - height);

    let region = CropRegion {
        x,
        y,
        width,
        height,
    };
    let display_rect = display;
    debug!(display = ?display_rect, scale_x, scale_y, ?region, "Resolved crop region");
    Ok(region)
}

/// Render a crop region into a buffer of exactly `target_w` × `target_h`
/// using bilinear sampling. The output keeps the source pixel format.
pub fn render(
    source: &RasterBuffer,
    region: &CropRegion,
    target_w: u32,
    target_h: u32,
) -> Result<RasterBuffer> {
    let sw = f64::from(source.width());
    let sh = f64::from(source.height());
    const EPS: f64 = 1e-6;

    if region.width < MIN_CROP_PX
        || region.height < MIN_CROP_PX
        || region.x < -EPS
        || region.y < -EPS
        || region.x + region.width > sw + EPS
        || region.y + region.height > sh + EPS
    {
        return Err(PipelineError::CropOutOfBounds(format!(
            "region {region:?} outside {}x{} source",
            source.width(),
            source.height()
        )));
    }

    let channels = source.format().channels();
    let src = source.data();
    let src_stride = source.width() as usize * channels;
    let mut out = vec![0u8; target_w as usize * target_h as usize * channels];

    for ty in 0..target_h {
        let sy = region.y + (f64::from(ty) + 0.5) * region.height / f64::from(target_h) - 0.5;
        let (y0, y1, fy) = sample_axis(sy, source.height());
        for tx in 0..target_w {
            let sx = region.x + (f64::from(tx) + 0.5) * region.width / f64::from(target_w) - 0.5;
            let (x0, x1, fx) = sample_axis(sx, source.width());

            let base = (ty as usize * target_w as usize + tx as usize) * channels;
            for c in 0..channels {
                let p00 = f64::from(src[y0 * src_stride + x0 * channels + c]);
                let p10 = f64::from(src[y0 * src_stride + x1 * channels + c]);
                let p01 = f64::from(src[y1 * src_stride + x0 * channels + c]);
                let p11 = f64::from(src[y1 * src_stride + x1 * channels + c]);
                let top = p00 * (1.0 - fx) + p10 * fx;
                let bottom = p01 * (1.0 - fx) + p11 * fx;
                out[base + c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    debug!(
        target_w,
        target_h,
        format = ?source.format(),
        "Rendered crop region"
    );
    RasterBuffer::new(target_w, target_h, source.format(), out)
}

/// Clamp a sample coordinate and split it into the two neighbor indices and
/// the interpolation fraction.
fn sample_axis(coord: f64, max: u32) -> (usize, usize, f64) {
    let clamped = coord.clamp(0.0, f64::from(max - 1));
    let i0 = clamped.floor() as usize;
    let i1 = (i0 + 1).min(max as usize - 1);
    (i0, i1, clamped - i0 as f64)
}

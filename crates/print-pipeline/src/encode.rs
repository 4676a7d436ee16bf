//! Size-constrained encoding.
//!
//! Searches an encoder quality parameter until the encoded byte count lands
//! inside an acceptance window, or returns the best candidate after a hard
//! iteration ceiling. The step sizes are intentionally asymmetric: overshoot
//! above the maximum is corrected faster (-5) than undershoot below the
//! minimum (+2), because the downstream API enforces a hard upper limit.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::raster::{PixelFormat, RasterBuffer};
use crate::{PipelineError, Result};

/// Native (PNG quality search) parameters.
const PNG_START_QUALITY: u8 = 92;
const PNG_QUALITY_MIN: u8 = 50;
const PNG_QUALITY_MAX: u8 = 100;
const PNG_STEP_UP: u8 = 2;
const PNG_STEP_DOWN: u8 = 5;
const PNG_MAX_ATTEMPTS: u32 = 20;

/// Escalating (PNG -> JPEG) parameters.
const JPEG_START_QUALITY: f32 = 0.90;
const JPEG_STEP: f32 = 0.08;
const JPEG_FLOOR: f32 = 0.05;
const JPEG_STOP_BELOW: f32 = 0.1;
const JPEG_MAX_ATTEMPTS: u32 = 25;

/// Inclusive byte-count acceptance band for an encoded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeWindow {
    pub min_bytes: usize,
    pub max_bytes: usize,
}

impl SizeWindow {
    /// Default window for the native path: 80–140 KiB, leaving margin under
    /// the upstream 180 KiB hard limit.
    pub const NATIVE: SizeWindow = SizeWindow {
        min_bytes: 80 * 1024,
        max_bytes: 140 * 1024,
    };

    /// Default window for the escalating path: anything up to 180 KiB.
    pub const ESCALATING: SizeWindow = SizeWindow {
        min_bytes: 0,
        max_bytes: 180 * 1024,
    };

    pub fn contains(&self, size: usize) -> bool {
        size >= self.min_bytes && size <= self.max_bytes
    }
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Png,
    Jpeg,
}

impl ArtifactFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ArtifactFormat::Png => "image/png",
            ArtifactFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpeg => "jpg",
        }
    }
}

/// One encode attempt's output.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub format: ArtifactFormat,
    /// Quality parameter the artifact was encoded with (percent scale).
    pub quality: u8,
}

impl EncodedArtifact {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Result of a size-window search.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub artifact: EncodedArtifact,
    pub attempts: u32,
    /// False when the iteration budget ran out before the window was hit
    /// (best-effort artifact; callers may still upload).
    pub window_met: bool,
}

/// Which size-search strategy to run. Both share the same contract:
/// deterministic step direction from the previous measured size and a hard
/// iteration ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderBackend {
    /// PNG-only quality search (server codec path).
    Native,
    /// PNG once, then JPEG re-encoding when PNG overshoots the maximum.
    Escalating,
}

/// Encode `raster` so its byte size lands inside `window`, or return the
/// best candidate once the attempt budget is exhausted.
///
/// Cancellation is cooperative: the token is checked between iterations and
/// no partial artifact is surfaced.
pub fn encode_to_window(
    raster: &RasterBuffer,
    window: SizeWindow,
    backend: EncoderBackend,
    cancel: Option<&CancellationToken>,
) -> Result<EncodeReport> {
    match backend {
        EncoderBackend::Native => {
            search_native(|q| encode_png_quality(raster, q), &window, cancel)
        }
        EncoderBackend::Escalating => search_escalating(
            || encode_png_quality(raster, PNG_QUALITY_MAX),
            |q| encode_jpeg(raster, q),
            &window,
            cancel,
        ),
    }
}

/// PNG quality search: start at 92, +2 under the window (<= 100), -5 over it
/// (>= 50), up to 20 attempts, returning the last artifact on exhaustion.
fn search_native(
    mut encode: impl FnMut(u8) -> Result<EncodedArtifact>,
    window: &SizeWindow,
    cancel: Option<&CancellationToken>,
) -> Result<EncodeReport> {
    let mut quality = PNG_START_QUALITY;
    let mut attempts = 0u32;
    let mut last: Option<EncodedArtifact> = None;

    while attempts < PNG_MAX_ATTEMPTS {
        check_cancel(cancel)?;
        attempts += 1;

        let artifact = encode(quality)?;
        let size = artifact.size_bytes();
        debug!(attempt = attempts, quality, size_kb = size / 1024, "PNG encode attempt");

        if window.contains(size) {
            return Ok(EncodeReport {
                artifact,
                attempts,
                window_met: true,
            });
        }

        if size < window.min_bytes {
            quality = (quality + PNG_STEP_UP).min(PNG_QUALITY_MAX);
        } else {
            quality = quality.saturating_sub(PNG_STEP_DOWN).max(PNG_QUALITY_MIN);
        }
        last = Some(artifact);
    }

    let artifact = last.ok_or_else(|| {
        PipelineError::EncodeUnavailable("no encode attempts were made".into())
    })?;
    warn!(
        attempts,
        size_kb = artifact.size_bytes() / 1024,
        "Size window unmet, returning last attempt"
    );
    Ok(EncodeReport {
        artifact,
        attempts,
        window_met: false,
    })
}

/// PNG once; when it exceeds the maximum, escalate to JPEG from quality 0.90
/// stepping -0.08 (floor 0.05), tracking the smallest blob observed.
fn search_escalating(
    encode_png: impl FnOnce() -> Result<EncodedArtifact>,
    mut encode_jpeg: impl FnMut(f32) -> Result<EncodedArtifact>,
    window: &SizeWindow,
    cancel: Option<&CancellationToken>,
) -> Result<EncodeReport> {
    check_cancel(cancel)?;
    let png = encode_png()?;
    let mut attempts = 1u32;
    let png_size = png.size_bytes();
    debug!(size_kb = png_size / 1024, "Initial PNG encode");

    if window.contains(png_size) {
        return Ok(EncodeReport {
            artifact: png,
            attempts,
            window_met: true,
        });
    }

    let mut best = png;
    let mut quality = JPEG_START_QUALITY;

    for _ in 0..JPEG_MAX_ATTEMPTS {
        check_cancel(cancel)?;
        attempts += 1;

        let jpeg = encode_jpeg(quality)?;
        let size = jpeg.size_bytes();
        debug!(
            attempt = attempts,
            quality,
            size_kb = size / 1024,
            "JPEG escalation attempt"
        );

        if window.contains(size) {
            return Ok(EncodeReport {
                artifact: jpeg,
                attempts,
                window_met: true,
            });
        }
        if size < best.size_bytes() {
            best = jpeg;
        }
        if quality <= JPEG_STOP_BELOW {
            break;
        }
        quality = (quality - JPEG_STEP).max(JPEG_FLOOR);
    }

    warn!(
        attempts,
        size_kb = best.size_bytes() / 1024,
        "Size window unmet, returning smallest observed blob"
    );
    Ok(EncodeReport {
        artifact: best,
        attempts,
        window_met: false,
    })
}

fn check_cancel(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(PipelineError::Cancelled),
        _ => Ok(()),
    }
}

/// PNG encode at a quality level.
///
/// PNG is lossless, so "quality" maps to the number of retained gray levels
/// before encoding (a palette-quality proxy, as native codecs expose):
/// quality 100 keeps all 256 levels, quality 50 roughly half. Fewer levels
/// compress smaller. Alpha is never posterized.
fn encode_png_quality(raster: &RasterBuffer, quality: u8) -> Result<EncodedArtifact> {
    let levels = 2 + u32::from(quality) * 254 / 100;
    let (width, height) = raster.dimensions();

    let mut data = raster.data().to_vec();
    if levels < 256 {
        let alpha_stride = match raster.format() {
            PixelFormat::Rgba8 => Some(4),
            PixelFormat::Gray8 => None,
        };
        posterize(&mut data, levels, alpha_stride);
    }

    let color = match raster.format() {
        PixelFormat::Rgba8 => ExtendedColorType::Rgba8,
        PixelFormat::Gray8 => ExtendedColorType::L8,
    };

    let mut out = Vec::new();
    PngEncoder::new_with_quality(
        Cursor::new(&mut out),
        CompressionType::Best,
        PngFilter::Adaptive,
    )
    .write_image(&data, width, height, color)
    .map_err(|e| PipelineError::EncodeUnavailable(e.to_string()))?;

    Ok(EncodedArtifact {
        bytes: out,
        format: ArtifactFormat::Png,
        quality,
    })
}

/// JPEG encode at a fractional quality (0.0..=1.0). The pipeline output is
/// grayscale, so the artifact is a single-channel JPEG.
fn encode_jpeg(raster: &RasterBuffer, quality: f32) -> Result<EncodedArtifact> {
    let percent = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let gray = raster.to_gray_image();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut out), percent)
        .write_image(
            gray.as_raw(),
            gray.width(),
            gray.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| PipelineError::EncodeUnavailable(e.to_string()))?;

    Ok(EncodedArtifact {
        bytes: out,
        format: ArtifactFormat::Jpeg,
        quality: percent,
    })
}

/// Quantize channel values down to `levels` evenly spaced steps.
fn posterize(data: &mut [u8], levels: u32, alpha_stride: Option<usize>) {
    let max_level = (levels - 1) as f32;
    for (i, v) in data.iter_mut().enumerate() {
        if let Some(stride) = alpha_stride {
            if i % stride == stride - 1 {
                continue;
            }
        }
        let step = (f32::from(*v) * max_level / 255.0).round();
        *v = (step * 255.0 / max_level).round() as u8;
    }
}

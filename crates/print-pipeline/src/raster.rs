//! Owned raster pixel buffers.
//!
//! `RasterBuffer` is the unit of exchange between pipeline stages. It owns
//! its pixel memory exclusively; stages take it by value and hand back a new
//! buffer rather than sharing.

use image::{DynamicImage, GrayImage, RgbaImage};
use tracing::debug;

use crate::{PipelineError, Result};

/// Supported pixel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel.
    Rgba8,
    /// 8-bit single-channel luma, 1 byte per pixel.
    Gray8,
}

impl PixelFormat {
    /// Number of bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A contiguous pixel buffer with explicit dimensions and format.
///
/// Invariant: `data.len() == width * height * format.channels()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Create a buffer from raw pixel data, validating the size invariant.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidImageData(format!(
                "zero-sized raster {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(PipelineError::InvalidImageData(format!(
                "buffer length {} does not match {width}x{height} {format:?} (expected {expected})",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Create a buffer filled with a single byte value in every channel.
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8) -> Result<Self> {
        let len = width as usize * height as usize * format.channels();
        let mut data = vec![value; len];
        // Alpha stays opaque for RGBA fills.
        if format == PixelFormat::Rgba8 {
            for px in data.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }
        Self::new(width, height, format, data)
    }

    /// Decode an encoded image (PNG, JPEG, or the first GIF frame) into an
    /// RGBA buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidImageData("empty input".into()));
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::InvalidImageData(e.to_string()))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Decoded source image"
        );
        Ok(Self::from_rgba_image(img.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return the raw pixel data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Wrap an `image` crate RGBA image.
    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            data: img.into_raw(),
        }
    }

    /// Wrap an `image` crate grayscale image.
    pub fn from_gray_image(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Gray8,
            data: img.into_raw(),
        }
    }

    /// View as an RGBA image, expanding Gray8 by replicating luma into RGB.
    pub fn to_rgba_image(&self) -> RgbaImage {
        match self.format {
            PixelFormat::Rgba8 => {
                RgbaImage::from_raw(self.width, self.height, self.data.clone())
                    .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
            }
            PixelFormat::Gray8 => {
                let mut out = RgbaImage::new(self.width, self.height);
                for (px, &v) in out.pixels_mut().zip(self.data.iter()) {
                    *px = image::Rgba([v, v, v, 255]);
                }
                out
            }
        }
    }

    /// View as a grayscale image. For RGBA buffers that already carry
    /// replicated luma (R=G=B) this takes the red channel verbatim.
    pub fn to_gray_image(&self) -> GrayImage {
        match self.format {
            PixelFormat::Gray8 => {
                GrayImage::from_raw(self.width, self.height, self.data.clone())
                    .unwrap_or_else(|| GrayImage::new(self.width, self.height))
            }
            PixelFormat::Rgba8 => {
                let mut out = GrayImage::new(self.width, self.height);
                for (px, src) in out.pixels_mut().zip(self.data.chunks_exact(4)) {
                    *px = image::Luma([src[0]]);
                }
                out
            }
        }
    }

    /// Convert to a `DynamicImage` for the `image` crate encoders.
    pub fn to_dynamic(&self) -> DynamicImage {
        match self.format {
            PixelFormat::Rgba8 => DynamicImage::ImageRgba8(self.to_rgba_image()),
            PixelFormat::Gray8 => DynamicImage::ImageLuma8(self.to_gray_image()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_enforces_length_invariant() {
        let err = RasterBuffer::new(2, 2, PixelFormat::Rgba8, vec![0; 15]);
        assert!(matches!(err, Err(PipelineError::InvalidImageData(_))));

        let ok = RasterBuffer::new(2, 2, PixelFormat::Rgba8, vec![0; 16]);
        assert!(ok.is_ok());
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        let err = RasterBuffer::new(0, 5, PixelFormat::Gray8, vec![]);
        assert!(matches!(err, Err(PipelineError::InvalidImageData(_))));
    }

    #[test]
    fn filled_rgba_is_opaque() {
        let buf = RasterBuffer::filled(2, 1, PixelFormat::Rgba8, 10).unwrap();
        assert_eq!(buf.data(), &[10, 10, 10, 255, 10, 10, 10, 255]);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = RasterBuffer::decode(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(err, Err(PipelineError::InvalidImageData(_))));

        let err = RasterBuffer::decode(&[]);
        assert!(matches!(err, Err(PipelineError::InvalidImageData(_))));
    }

    #[test]
    fn decode_png_roundtrip() {
        // Encode a tiny image with the image crate, then decode through the
        // pipeline entry point.
        let img = GrayImage::from_pixel(3, 2, image::Luma([200]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();

        let buf = RasterBuffer::decode(bytes.get_ref()).unwrap();
        assert_eq!(buf.dimensions(), (3, 2));
        assert_eq!(buf.format(), PixelFormat::Rgba8);
        assert_eq!(&buf.data()[..4], &[200, 200, 200, 255]);
    }

    #[test]
    fn gray_rgba_conversion_roundtrip() {
        let gray = RasterBuffer::new(2, 2, PixelFormat::Gray8, vec![0, 85, 170, 255]).unwrap();
        let rgba = RasterBuffer::from_rgba_image(gray.to_rgba_image());
        assert_eq!(rgba.format(), PixelFormat::Rgba8);
        let back = RasterBuffer::from_gray_image(rgba.to_gray_image());
        assert_eq!(back, gray);
    }
}

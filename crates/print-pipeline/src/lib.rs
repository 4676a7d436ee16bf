//! Image pipeline for DIY cup-print uploads.
//!
//! Turns an arbitrary photo into a fixed-geometry (596×832) grayscale
//! raster inside a byte-size window: grayscale conversion, aspect-locked
//! cropping, layered stroke/text annotation with undo, and an iterative
//! size-constrained encoder.

pub mod annotate;
pub mod crop;
pub mod encode;
pub mod grayscale;
pub mod prepare;
pub mod raster;

// Re-exports for convenience
pub use annotate::{AnnotationDocument, AnnotationLayer, BrushKind, Ink, Point};
pub use crop::{CropRegion, RectF};
pub use encode::{ArtifactFormat, EncodeReport, EncodedArtifact, EncoderBackend, SizeWindow};
pub use grayscale::to_grayscale;
pub use prepare::{PreparedUpload, SignatureProvider, UploadPreparer};
pub use raster::{PixelFormat, RasterBuffer};

/// Output width in pixels required by the downstream print system.
pub const TARGET_WIDTH: u32 = 596;

/// Output height in pixels required by the downstream print system.
pub const TARGET_HEIGHT: u32 = 832;

/// Fixed crop aspect ratio (width / height).
pub const TARGET_ASPECT: f64 = TARGET_WIDTH as f64 / TARGET_HEIGHT as f64;

/// Errors that can occur in the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),

    #[error("Crop region does not fit the source image: {0}")]
    CropOutOfBounds(String),

    #[error("No font configured for text annotations")]
    FontUnavailable,

    #[error("Encoder backend unavailable: {0}")]
    EncodeUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

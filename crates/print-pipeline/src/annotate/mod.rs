//! Layered annotation over a fixed-resolution grayscale background.
//!
//! An `AnnotationDocument` owns the cropped background raster and an ordered,
//! append-only stack of stroke/text layers with strict LIFO undo. Layers are
//! composited over a copy of the background on demand; the background itself
//! is never touched.

mod brush;
mod document;
mod layer;

pub use document::AnnotationDocument;
pub use layer::{AnnotationLayer, BrushKind, Ink, Point};

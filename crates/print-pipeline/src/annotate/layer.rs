//! Annotation layer model.

use serde::{Deserialize, Serialize};

/// A point in document pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ink color for annotation layers. The document is grayscale, so the editor
/// offers exactly black and white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ink {
    Black,
    White,
}

impl Ink {
    /// The luma value painted for this ink.
    pub fn luma(self) -> u8 {
        match self {
            Ink::Black => 0,
            Ink::White => 255,
        }
    }
}

/// Freehand brush kinds. Each is a distinct rasterization rule, not a
/// stroke-width variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushKind {
    /// Constant-width polyline.
    Pencil,
    /// Circular dabs stamped at the recorded points.
    Circle,
    /// Randomized dot scatter around the path.
    Spray,
}

/// One annotation layer as it crosses the wire. The creation index is
/// assigned by the document when the layer is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnnotationLayer {
    Stroke {
        points: Vec<Point>,
        ink: Ink,
        width: f32,
        brush: BrushKind,
    },
    Text {
        content: String,
        position: Point,
        #[serde(rename = "fontSize")]
        font_size: f32,
        ink: Ink,
    },
}

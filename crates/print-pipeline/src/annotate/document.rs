//! The annotation document: background + ordered layer stack + undo.

use ab_glyph::{FontArc, PxScale};
use image::Luma;
use imageproc::drawing::draw_text_mut;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use super::brush;
use super::layer::{AnnotationLayer, BrushKind, Ink, Point};
use crate::grayscale::to_grayscale;
use crate::raster::RasterBuffer;
use crate::{PipelineError, Result, TARGET_HEIGHT, TARGET_WIDTH};

/// Brush width limits offered by the editor.
const MIN_BRUSH_WIDTH: f32 = 1.0;
const MAX_BRUSH_WIDTH: f32 = 50.0;

/// A layer plus its document-assigned creation index. Spray strokes carry
/// their precomputed scatter so compositing stays deterministic.
#[derive(Debug, Clone)]
struct IndexedLayer {
    index: u64,
    layer: AnnotationLayer,
    scatter: Option<Vec<Point>>,
}

/// Ordered, undoable annotation stack over a fixed-resolution grayscale
/// background.
///
/// The background is immutable input: `composite()` paints every layer in
/// insertion order onto a fresh copy, so it can be called repeatedly and
/// yields identical output for unchanged layer state.
pub struct AnnotationDocument {
    background: RasterBuffer,
    layers: Vec<IndexedLayer>,
    next_index: u64,
    font: Option<FontArc>,
    rng: StdRng,
}

impl AnnotationDocument {
    /// Create a document over a background raster.
    ///
    /// The background must already be at the fixed target resolution; it is
    /// collapsed to single-channel grayscale on the way in.
    pub fn new(background: RasterBuffer) -> Result<Self> {
        if background.dimensions() != (TARGET_WIDTH, TARGET_HEIGHT) {
            return Err(PipelineError::InvalidImageData(format!(
                "background must be {TARGET_WIDTH}x{TARGET_HEIGHT}, got {}x{}",
                background.width(),
                background.height()
            )));
        }
        let gray = to_grayscale(background)?;
        let background = RasterBuffer::from_gray_image(gray.to_gray_image());
        Ok(Self {
            background,
            layers: Vec::new(),
            next_index: 0,
            font: None,
            rng: StdRng::from_entropy(),
        })
    }

    /// Configure the font used for text layers.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Pin the spray scatter RNG. Spray is intentionally non-deterministic
    /// otherwise.
    pub fn with_spray_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Append a freehand stroke layer. Returns the layer's creation index.
    pub fn add_stroke(
        &mut self,
        points: Vec<Point>,
        ink: Ink,
        width: f32,
        brush: BrushKind,
    ) -> u64 {
        let width = width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
        let scatter = match brush {
            BrushKind::Spray => Some(brush::spray_scatter(&points, width, &mut self.rng)),
            _ => None,
        };
        let index = self.push(
            AnnotationLayer::Stroke {
                points,
                ink,
                width,
                brush,
            },
            scatter,
        );
        debug!(index, ?brush, width, "Added stroke layer");
        index
    }

    /// Append a text layer. The position is clamped into the document
    /// bounds. Fails when no font is configured.
    pub fn add_text(
        &mut self,
        content: impl Into<String>,
        position: Point,
        font_size: f32,
        ink: Ink,
    ) -> Result<u64> {
        if self.font.is_none() {
            return Err(PipelineError::FontUnavailable);
        }
        let index = self.push(
            AnnotationLayer::Text {
                content: content.into(),
                position: clamp_position(position),
                font_size: font_size.max(1.0),
                ink,
            },
            None,
        );
        debug!(index, "Added text layer");
        Ok(index)
    }

    /// Append a wire-format layer (used by the upload endpoint).
    pub fn apply(&mut self, layer: AnnotationLayer) -> Result<u64> {
        match layer {
            AnnotationLayer::Stroke {
                points,
                ink,
                width,
                brush,
            } => Ok(self.add_stroke(points, ink, width, brush)),
            AnnotationLayer::Text {
                content,
                position,
                font_size,
                ink,
            } => self.add_text(content, position, font_size, ink),
        }
    }

    /// Remove the most recently appended layer. Returns its creation index,
    /// or `None` when the stack is already empty (a no-op, never an error).
    pub fn undo(&mut self) -> Option<u64> {
        let removed = self.layers.pop().map(|l| l.index);
        if let Some(index) = removed {
            debug!(index, "Undid layer");
        }
        removed
    }

    /// Flatten the document: background copy + every layer in insertion
    /// order. Output is always the fixed target resolution, Gray8.
    pub fn composite(&self) -> RasterBuffer {
        let mut canvas = self.background.to_gray_image();

        for entry in &self.layers {
            match &entry.layer {
                AnnotationLayer::Stroke {
                    points,
                    ink,
                    width,
                    brush,
                } => match brush {
                    BrushKind::Pencil => brush::paint_pencil(&mut canvas, points, *ink, *width),
                    BrushKind::Circle => brush::paint_circle(&mut canvas, points, *ink, *width),
                    BrushKind::Spray => {
                        if let Some(scatter) = &entry.scatter {
                            brush::paint_spray(&mut canvas, scatter, *ink);
                        }
                    }
                },
                AnnotationLayer::Text {
                    content,
                    position,
                    font_size,
                    ink,
                } => {
                    if let Some(font) = &self.font {
                        draw_text_mut(
                            &mut canvas,
                            Luma([ink.luma()]),
                            position.x.round() as i32,
                            position.y.round() as i32,
                            PxScale::from(*font_size),
                            font,
                            content,
                        );
                    }
                }
            }
        }

        RasterBuffer::from_gray_image(canvas)
    }

    fn push(&mut self, layer: AnnotationLayer, scatter: Option<Vec<Point>>) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.layers.push(IndexedLayer {
            index,
            layer,
            scatter,
        });
        index
    }
}

/// Clamp a text anchor into the document bounds.
fn clamp_position(p: Point) -> Point {
    Point::new(
        p.x.clamp(0.0, TARGET_WIDTH as f32),
        p.y.clamp(0.0, TARGET_HEIGHT as f32),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;

    fn white_background() -> RasterBuffer {
        RasterBuffer::filled(TARGET_WIDTH, TARGET_HEIGHT, PixelFormat::Gray8, 255).unwrap()
    }

    fn pencil_points() -> Vec<Point> {
        vec![
            Point::new(10.0, 10.0),
            Point::new(40.0, 30.0),
            Point::new(80.0, 35.0),
            Point::new(120.0, 90.0),
            Point::new(200.0, 100.0),
        ]
    }

    /// Best-effort system font for text rendering tests; the pipeline itself
    /// never loads fonts from disk.
    fn system_font() -> Option<FontArc> {
        const CANDIDATES: &[&str] = &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ];
        CANDIDATES
            .iter()
            .filter_map(|p| std::fs::read(p).ok())
            .find_map(|bytes| FontArc::try_from_vec(bytes).ok())
    }

    #[test]
    fn rejects_wrong_background_dimensions() {
        let bg = RasterBuffer::filled(100, 100, PixelFormat::Gray8, 255).unwrap();
        let err = AnnotationDocument::new(bg);
        assert!(matches!(err, Err(PipelineError::InvalidImageData(_))));
    }

    #[test]
    fn composite_dimensions_are_invariant() {
        let mut doc = AnnotationDocument::new(white_background())
            .unwrap()
            .with_spray_seed(3);

        assert_eq!(
            doc.composite().dimensions(),
            (TARGET_WIDTH, TARGET_HEIGHT)
        );

        doc.add_stroke(pencil_points(), Ink::Black, 3.0, BrushKind::Pencil);
        doc.add_stroke(pencil_points(), Ink::White, 12.0, BrushKind::Circle);
        doc.add_stroke(pencil_points(), Ink::Black, 8.0, BrushKind::Spray);

        assert_eq!(
            doc.composite().dimensions(),
            (TARGET_WIDTH, TARGET_HEIGHT)
        );
    }

    #[test]
    fn composite_copies_rather_than_mutates_background() {
        let mut doc = AnnotationDocument::new(white_background()).unwrap();
        doc.add_stroke(pencil_points(), Ink::Black, 5.0, BrushKind::Pencil);

        let first = doc.composite();
        let second = doc.composite();
        assert_eq!(first, second);
    }

    #[test]
    fn stroke_then_undo_restores_pixels_exactly() {
        let mut doc = AnnotationDocument::new(white_background()).unwrap();
        let before = doc.composite();

        doc.add_stroke(pencil_points(), Ink::Black, 3.0, BrushKind::Pencil);
        assert_ne!(doc.composite(), before);

        doc.undo();
        assert_eq!(doc.composite(), before);
    }

    #[test]
    fn undo_is_strict_lifo() {
        let mut doc = AnnotationDocument::new(white_background())
            .unwrap()
            .with_spray_seed(11);

        let a = doc.add_stroke(pencil_points(), Ink::Black, 3.0, BrushKind::Pencil);
        let b = doc.add_stroke(pencil_points(), Ink::Black, 6.0, BrushKind::Circle);
        let c = doc.add_stroke(pencil_points(), Ink::Black, 9.0, BrushKind::Spray);
        assert_eq!((a, b, c), (0, 1, 2));

        assert_eq!(doc.undo(), Some(2));
        assert_eq!(doc.undo(), Some(1));
        assert_eq!(doc.undo(), Some(0));
        assert_eq!(doc.layer_count(), 0);
    }

    #[test]
    fn undo_on_empty_stack_is_noop() {
        let mut doc = AnnotationDocument::new(white_background()).unwrap();
        assert_eq!(doc.undo(), None);
        assert_eq!(doc.composite().dimensions(), (TARGET_WIDTH, TARGET_HEIGHT));
    }

    #[test]
    fn n_undos_restore_background_only_state() {
        let mut doc = AnnotationDocument::new(white_background())
            .unwrap()
            .with_spray_seed(5);
        let before = doc.composite();

        doc.add_stroke(pencil_points(), Ink::Black, 4.0, BrushKind::Pencil);
        doc.add_stroke(pencil_points(), Ink::White, 10.0, BrushKind::Circle);
        doc.add_stroke(pencil_points(), Ink::Black, 7.0, BrushKind::Spray);
        for _ in 0..3 {
            doc.undo();
        }

        assert_eq!(doc.composite(), before);
    }

    #[test]
    fn creation_indices_keep_growing_after_undo() {
        let mut doc = AnnotationDocument::new(white_background()).unwrap();
        doc.add_stroke(pencil_points(), Ink::Black, 3.0, BrushKind::Pencil);
        doc.undo();
        let next = doc.add_stroke(pencil_points(), Ink::Black, 3.0, BrushKind::Pencil);
        assert_eq!(next, 1);
    }

    #[test]
    fn seeded_spray_composites_identically() {
        let mut a = AnnotationDocument::new(white_background())
            .unwrap()
            .with_spray_seed(99);
        let mut b = AnnotationDocument::new(white_background())
            .unwrap()
            .with_spray_seed(99);

        a.add_stroke(pencil_points(), Ink::Black, 8.0, BrushKind::Spray);
        b.add_stroke(pencil_points(), Ink::Black, 8.0, BrushKind::Spray);

        assert_eq!(a.composite(), b.composite());
    }

    #[test]
    fn text_without_font_is_rejected() {
        let mut doc = AnnotationDocument::new(white_background()).unwrap();
        let err = doc.add_text("hello", Point::new(100.0, 100.0), 24.0, Ink::Black);
        assert!(matches!(err, Err(PipelineError::FontUnavailable)));
        assert_eq!(doc.layer_count(), 0);
    }

    #[test]
    fn text_position_is_clamped_into_bounds() {
        let clamped = clamp_position(Point::new(-40.0, 9000.0));
        assert_eq!(clamped.x, 0.0);
        assert_eq!(clamped.y, TARGET_HEIGHT as f32);
    }

    #[test]
    fn text_layer_paints_and_undoes() {
        let Some(font) = system_font() else {
            // No usable system font on this machine; covered elsewhere.
            return;
        };
        let mut doc = AnnotationDocument::new(white_background())
            .unwrap()
            .with_font(font);
        let before = doc.composite();

        doc.add_text("hello", Point::new(50.0, 50.0), 32.0, Ink::Black)
            .unwrap();
        let with_text = doc.composite();
        assert_ne!(with_text, before);
        assert_eq!(with_text.dimensions(), (TARGET_WIDTH, TARGET_HEIGHT));

        doc.undo();
        assert_eq!(doc.composite(), before);
    }
}

//! Brush rasterization rules.
//!
//! Pencil interpolates dabs along each segment, circle stamps dabs at the
//! recorded points only, and spray scatters single-pixel dots around the
//! path. Spray scatter is computed once when the stroke is added (see
//! `AnnotationDocument::add_stroke`), so painting itself is deterministic.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use rand::Rng;
use rand::rngs::StdRng;

use super::layer::{Ink, Point};

/// Scatter dots generated per path point, per pixel of brush width.
const SPRAY_DOTS_PER_WIDTH: f32 = 3.0;

/// Paint a constant-width polyline by stamping dabs at ~1px intervals along
/// every segment.
pub(super) fn paint_pencil(canvas: &mut GrayImage, points: &[Point], ink: Ink, width: f32) {
    let radius = dab_radius(width);
    match points {
        [] => {}
        [only] => dab(canvas, *only, radius, ink),
        _ => {
            for pair in points.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let dist = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
                let steps = dist.ceil().max(1.0) as u32;
                for i in 0..=steps {
                    let t = i as f32 / steps as f32;
                    let p = Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
                    dab(canvas, p, radius, ink);
                }
            }
        }
    }
}

/// Stamp a circular dab at each recorded point.
pub(super) fn paint_circle(canvas: &mut GrayImage, points: &[Point], ink: Ink, width: f32) {
    let radius = dab_radius(width);
    for p in points {
        dab(canvas, *p, radius, ink);
    }
}

/// Generate the scatter offsets for a spray stroke: for each path point,
/// a width-proportional number of dots uniformly distributed in a disc of
/// the brush width around it.
pub(super) fn spray_scatter(points: &[Point], width: f32, rng: &mut StdRng) -> Vec<Point> {
    let radius = width.max(1.0);
    let dots_per_point = ((width * SPRAY_DOTS_PER_WIDTH).round() as usize).max(4);

    let mut scatter = Vec::with_capacity(points.len() * dots_per_point);
    for p in points {
        for _ in 0..dots_per_point {
            // sqrt keeps the distribution uniform over the disc area
            let r = radius * rng.gen_range(0.0f32..1.0).sqrt();
            let theta = rng.gen_range(0.0..std::f32::consts::TAU);
            scatter.push(Point::new(p.x + r * theta.cos(), p.y + r * theta.sin()));
        }
    }
    scatter
}

/// Paint precomputed spray dots as single pixels.
pub(super) fn paint_spray(canvas: &mut GrayImage, scatter: &[Point], ink: Ink) {
    for p in scatter {
        put_pixel_clipped(canvas, p.x.round() as i64, p.y.round() as i64, ink);
    }
}

fn dab_radius(width: f32) -> i32 {
    (width.max(1.0) / 2.0).round() as i32
}

fn dab(canvas: &mut GrayImage, center: Point, radius: i32, ink: Ink) {
    let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
    if radius <= 0 {
        put_pixel_clipped(canvas, cx, cy, ink);
        return;
    }
    // draw_filled_circle_mut clips against the canvas bounds itself.
    draw_filled_circle_mut(
        canvas,
        (cx as i32, cy as i32),
        radius,
        Luma([ink.luma()]),
    );
}

fn put_pixel_clipped(canvas: &mut GrayImage, x: i64, y: i64, ink: Ink) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, Luma([ink.luma()]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn white_canvas(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255]))
    }

    #[test]
    fn pencil_connects_the_segment() {
        let mut canvas = white_canvas(40, 40);
        let points = [Point::new(5.0, 5.0), Point::new(30.0, 5.0)];
        paint_pencil(&mut canvas, &points, Ink::Black, 3.0);

        // Every column between the endpoints is touched on the stroke row.
        for x in 5..=30 {
            assert_eq!(canvas.get_pixel(x, 5).0[0], 0, "gap at column {x}");
        }
    }

    #[test]
    fn pencil_single_point_stamps_one_dab() {
        let mut canvas = white_canvas(20, 20);
        paint_pencil(&mut canvas, &[Point::new(10.0, 10.0)], Ink::Black, 4.0);
        assert_eq!(canvas.get_pixel(10, 10).0[0], 0);
        // Dab stays local: corner untouched.
        assert_eq!(canvas.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn circle_stamps_only_recorded_points() {
        let mut canvas = white_canvas(40, 40);
        let points = [Point::new(5.0, 20.0), Point::new(35.0, 20.0)];
        paint_circle(&mut canvas, &points, Ink::Black, 4.0);

        assert_eq!(canvas.get_pixel(5, 20).0[0], 0);
        assert_eq!(canvas.get_pixel(35, 20).0[0], 0);
        // Midpoint between dabs stays untouched (no interpolation).
        assert_eq!(canvas.get_pixel(20, 20).0[0], 255);
    }

    #[test]
    fn spray_scatter_stays_within_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = [Point::new(50.0, 50.0)];
        let width = 8.0;
        let scatter = spray_scatter(&points, width, &mut rng);

        assert!(!scatter.is_empty());
        for dot in &scatter {
            let dist = ((dot.x - 50.0).powi(2) + (dot.y - 50.0).powi(2)).sqrt();
            assert!(dist <= width + 1e-3, "dot {dot:?} escaped the radius");
        }
    }

    #[test]
    fn spray_scatter_is_seed_deterministic() {
        let points = [Point::new(10.0, 10.0), Point::new(12.0, 14.0)];
        let a = spray_scatter(&points, 5.0, &mut StdRng::seed_from_u64(42));
        let b = spray_scatter(&points, 5.0, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn spray_dot_count_scales_with_width() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = [Point::new(0.0, 0.0)];
        let narrow = spray_scatter(&points, 2.0, &mut rng).len();
        let wide = spray_scatter(&points, 20.0, &mut rng).len();
        assert!(wide > narrow);
    }

    #[test]
    fn painting_clips_out_of_bounds_dots() {
        let mut canvas = white_canvas(10, 10);
        let scatter = [Point::new(-3.0, 4.0), Point::new(4.0, 40.0), Point::new(4.0, 4.0)];
        paint_spray(&mut canvas, &scatter, Ink::Black);
        assert_eq!(canvas.get_pixel(4, 4).0[0], 0);
    }

    #[test]
    fn white_ink_paints_white() {
        let mut canvas = GrayImage::from_pixel(10, 10, Luma([0]));
        paint_circle(&mut canvas, &[Point::new(5.0, 5.0)], Ink::White, 4.0);
        assert_eq!(canvas.get_pixel(5, 5).0[0], 255);
    }
}

//! Scanline glyph rasterization
//!
//! Converts glyph outlines to 8-bit coverage bitmaps. Quadratic segments are
//! flattened by recursive subdivision, then every pixel row is sampled on
//! several sub-scanlines. Each sub-scanline collects signed edge crossings,
//! accumulates the winding number from left to right and adds the exact
//! horizontal span length of every filled interval to the row, so edges get
//! fractional (anti-aliased) coverage.

use crate::outline::Outline;
use crate::{try_filled, Result, TextError};

/// Rule deciding which regions enclosed by contours are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    /// Filled where the winding number is non-zero (TrueType convention)
    #[default]
    NonZero,
    /// Filled where the winding number is odd
    EvenOdd,
}

impl FillRule {
    fn is_inside(self, winding: i32) -> bool {
        match self {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding & 1 != 0,
        }
    }
}

/// Rasterized glyph coverage with placement metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    /// Coverage values, row-major, one byte per pixel
    pub data: Vec<u8>,
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Offset from the pen position to the left edge of the bitmap
    pub xoff: i32,
    /// Distance from the baseline up to the top row of the bitmap
    pub yoff: i32,
    /// Horizontal advance in pixels
    pub advance: i32,
}

impl GlyphBitmap {
    /// A zero-sized bitmap that still advances the pen
    pub fn empty(advance: i32) -> Self {
        Self {
            advance,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage at `(x, y)`, 0 outside the bitmap
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data[(y * self.width + x) as usize]
    }
}

/// Vertical samples per pixel row
const SUBSAMPLES: usize = 5;

/// Maximum distance in pixels between a flattened curve and its chord
const FLATTEN_TOLERANCE: f32 = 0.2;

/// Subdivision depth limit for a single quadratic segment
const MAX_FLATTEN_DEPTH: u32 = 10;

/// Default pixel budget for one bitmap (4096 x 4096)
pub const DEFAULT_MAX_PIXELS: u64 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f32,
    y: f32,
}

impl Point {
    fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

/// A non-horizontal line segment in bitmap space
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    /// +1 for edges going down, -1 for edges going up
    direction: i32,
}

impl Edge {
    fn new(a: Point, b: Point) -> Option<Self> {
        if a.y == b.y {
            return None;
        }
        let direction = if b.y > a.y { 1 } else { -1 };
        Some(Self {
            x0: a.x,
            y0: a.y,
            x1: b.x,
            y1: b.y,
            direction,
        })
    }

    /// X position where the edge crosses `y`, if it does. The lower end is
    /// inclusive and the upper end exclusive so shared vertices count once.
    fn crossing(&self, y: f32) -> Option<f32> {
        let (top, bottom) = if self.y0 < self.y1 {
            (self.y0, self.y1)
        } else {
            (self.y1, self.y0)
        };
        if y < top || y >= bottom {
            return None;
        }
        let t = (y - self.y0) / (self.y1 - self.y0);
        Some(self.x0 + t * (self.x1 - self.x0))
    }
}

/// Outline rasterizer
#[derive(Debug, Clone, Copy)]
pub struct GlyphRasterizer {
    fill_rule: FillRule,
    max_pixels: u64,
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        Self::new(FillRule::default())
    }
}

impl GlyphRasterizer {
    pub fn new(fill_rule: FillRule) -> Self {
        Self {
            fill_rule,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    /// Largest bitmap, in pixels, `rasterize` will allocate
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Rasterizes `outline` (design units, y up) scaled by `scale_x` and
    /// `scale_y`. The result is in y-down bitmap space with `xoff`/`yoff`
    /// locating the bitmap relative to the pen position on the baseline.
    /// The advance is left at 0 for the caller to fill in.
    ///
    /// Outlines without a drawable contour and scales that collapse the glyph
    /// to nothing produce an empty bitmap. Bitmaps larger than the pixel
    /// budget fail with `TextError::BitmapTooLarge` before any allocation.
    pub fn rasterize(&self, outline: &Outline, scale_x: f32, scale_y: f32) -> Result<GlyphBitmap> {
        if outline.is_empty() || !scale_x.is_finite() || !scale_y.is_finite() {
            return Ok(GlyphBitmap::default());
        }

        let polygons = flatten_outline(outline, scale_x, scale_y);
        let Some((min_x, min_y, max_x, max_y)) = polygon_bounds(&polygons) else {
            return Ok(GlyphBitmap::default());
        };

        let x0 = min_x.floor();
        let y0 = min_y.floor();
        // Float to int casts saturate, so absurd extents still compare correctly
        let span_x = (max_x.ceil() as f64 - x0 as f64) as u64;
        let span_y = (max_y.ceil() as f64 - y0 as f64) as u64;
        if span_x == 0 || span_y == 0 {
            return Ok(GlyphBitmap::default());
        }
        if span_x.saturating_mul(span_y) > self.max_pixels {
            return Err(TextError::BitmapTooLarge {
                width: span_x,
                height: span_y,
                limit: self.max_pixels,
            });
        }
        let (Ok(width), Ok(height)) = (u32::try_from(span_x), u32::try_from(span_y)) else {
            return Err(TextError::BitmapTooLarge {
                width: span_x,
                height: span_y,
                limit: self.max_pixels,
            });
        };

        let edges: Vec<Edge> = polygons
            .iter()
            .flat_map(|poly| {
                let n = poly.len();
                (0..n).filter_map(move |i| {
                    let a = poly[i];
                    let b = poly[(i + 1) % n];
                    Edge::new(Point::new(a.x - x0, a.y - y0), Point::new(b.x - x0, b.y - y0))
                })
            })
            .collect();

        let data = self.fill(&edges, width, height)?;
        Ok(GlyphBitmap {
            data,
            width,
            height,
            xoff: x0 as i32,
            yoff: -(y0 as i32),
            advance: 0,
        })
    }

    fn fill(&self, edges: &[Edge], width: u32, height: u32) -> Result<Vec<u8>> {
        let w = width as usize;
        let mut data = try_filled(0u8, w * height as usize)?;
        let mut row = try_filled(0f32, w)?;
        let mut crossings: Vec<(f32, i32)> = Vec::new();
        let weight = 1.0 / SUBSAMPLES as f32;

        for y in 0..height as usize {
            row.fill(0.0);
            for s in 0..SUBSAMPLES {
                let sample_y = y as f32 + (s as f32 + 0.5) * weight;

                crossings.clear();
                crossings.extend(
                    edges
                        .iter()
                        .filter_map(|e| e.crossing(sample_y).map(|x| (x, e.direction))),
                );
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                for (i, &(x, direction)) in crossings.iter().enumerate() {
                    winding += direction;
                    if let Some(&(next_x, _)) = crossings.get(i + 1) {
                        if self.fill_rule.is_inside(winding) {
                            add_span(&mut row, x, next_x, weight);
                        }
                    }
                }
            }

            let out = &mut data[y * w..(y + 1) * w];
            for (pixel, &coverage) in out.iter_mut().zip(&row) {
                *pixel = (coverage * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
            }
        }
        Ok(data)
    }
}

/// Adds `weight` times the covered length of `[start, end)` to each pixel.
fn add_span(row: &mut [f32], start: f32, end: f32, weight: f32) {
    let start = start.max(0.0);
    let end = end.min(row.len() as f32);
    if end <= start {
        return;
    }

    let first = start.floor() as usize;
    let last = end.floor() as usize;
    if first == last {
        row[first] += (end - start) * weight;
        return;
    }

    row[first] += (first as f32 + 1.0 - start) * weight;
    for pixel in &mut row[first + 1..last] {
        *pixel += weight;
    }
    if let Some(pixel) = row.get_mut(last) {
        *pixel += (end - last as f32) * weight;
    }
}

/// Scales every contour into y-down pixel space and flattens its curves.
/// Contours with fewer than two points are dropped.
fn flatten_outline(outline: &Outline, scale_x: f32, scale_y: f32) -> Vec<Vec<Point>> {
    outline
        .contours
        .iter()
        .filter(|c| c.points.len() >= 2)
        .map(|contour| {
            let points: Vec<(Point, bool)> = contour
                .points
                .iter()
                .map(|p| (Point::new(p.x * scale_x, -p.y * scale_y), p.on_curve))
                .collect();
            flatten_contour(&points)
        })
        .filter(|poly| poly.len() >= 2)
        .collect()
}

/// Resolves implied on-curve points between consecutive off-curve points and
/// flattens each quadratic segment.
fn flatten_contour(points: &[(Point, bool)]) -> Vec<Point> {
    let n = points.len();
    let first_on = points.iter().position(|&(_, on)| on);
    let (start, begin) = match first_on {
        Some(i) => (points[i].0, i + 1),
        // All control points: start at an implied on-curve midpoint
        None => (points[n - 1].0.midpoint(points[0].0), 0),
    };

    let mut poly = vec![start];
    let mut last = start;
    let mut control: Option<Point> = None;

    for k in 0..n {
        let (p, on_curve) = points[(begin + k) % n];
        if on_curve {
            match control.take() {
                Some(c) => flatten_quad(last, c, p, 0, &mut poly),
                None => poly.push(p),
            }
            last = p;
        } else {
            if let Some(c) = control {
                let mid = c.midpoint(p);
                flatten_quad(last, c, mid, 0, &mut poly);
                last = mid;
            }
            control = Some(p);
        }
    }

    if let Some(c) = control {
        flatten_quad(last, c, start, 0, &mut poly);
    }
    // The closing edge is implicit
    if poly.len() > 1 && poly.last() == Some(&start) {
        poly.pop();
    }
    poly
}

/// De Casteljau subdivision until the control point is within tolerance of
/// the chord midpoint. Pushes every point after `p0`.
fn flatten_quad(p0: Point, control: Point, p2: Point, depth: u32, out: &mut Vec<Point>) {
    let mid = p0.midpoint(p2);
    let dx = control.x - mid.x;
    let dy = control.y - mid.y;
    if depth >= MAX_FLATTEN_DEPTH || dx * dx + dy * dy <= FLATTEN_TOLERANCE * FLATTEN_TOLERANCE {
        out.push(p2);
        return;
    }

    let p01 = p0.midpoint(control);
    let p12 = control.midpoint(p2);
    let split = p01.midpoint(p12);
    flatten_quad(p0, p01, split, depth + 1, out);
    flatten_quad(split, p12, p2, depth + 1, out);
}

fn polygon_bounds(polygons: &[Vec<Point>]) -> Option<(f32, f32, f32, f32)> {
    let mut points = polygons.iter().flatten();
    let first = points.next()?;
    let bounds = points.fold((first.x, first.y, first.x, first.y), |(x0, y0, x1, y1), p| {
        (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
    });
    let finite = [bounds.0, bounds.1, bounds.2, bounds.3]
        .iter()
        .all(|v| v.is_finite());
    finite.then_some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::{Contour, OutlinePoint};

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32, clockwise: bool) -> Contour {
        let mut points = vec![
            OutlinePoint::on(x0, y0),
            OutlinePoint::on(x0, y1),
            OutlinePoint::on(x1, y1),
            OutlinePoint::on(x1, y0),
        ];
        if !clockwise {
            points.reverse();
        }
        Contour { points }
    }

    fn ring(outer_cw: bool, inner_cw: bool) -> Outline {
        Outline::new(vec![
            rect(0.0, 0.0, 20.0, 20.0, outer_cw),
            rect(5.0, 5.0, 15.0, 15.0, inner_cw),
        ])
    }

    #[test]
    fn square_fills_completely() {
        let outline = Outline::new(vec![rect(0.0, 0.0, 8.0, 4.0, true)]);
        let bitmap = GlyphRasterizer::default().rasterize(&outline, 1.0, 1.0).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (8, 4));
        assert_eq!((bitmap.xoff, bitmap.yoff), (0, 4));
        assert!(bitmap.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn placement_follows_bounds() {
        // Sits 2 units below the baseline and starts 3 units right of the pen
        let outline = Outline::new(vec![rect(3.0, -2.0, 6.0, 5.0, true)]);
        let bitmap = GlyphRasterizer::default().rasterize(&outline, 1.0, 1.0).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (3, 7));
        assert_eq!(bitmap.xoff, 3);
        assert_eq!(bitmap.yoff, 5);
    }

    #[test]
    fn opposite_winding_hole_is_empty() {
        let bitmap = GlyphRasterizer::default().rasterize(&ring(true, false), 1.0, 1.0).unwrap();
        assert_eq!(bitmap.get(10, 10), 0);
        assert_eq!(bitmap.get(2, 10), 255);
        assert_eq!(bitmap.get(17, 3), 255);
    }

    #[test]
    fn same_winding_hole_depends_on_fill_rule() {
        let outline = ring(true, true);
        let non_zero = GlyphRasterizer::new(FillRule::NonZero).rasterize(&outline, 1.0, 1.0).unwrap();
        let even_odd = GlyphRasterizer::new(FillRule::EvenOdd).rasterize(&outline, 1.0, 1.0).unwrap();
        assert_eq!(non_zero.get(10, 10), 255);
        assert_eq!(even_odd.get(10, 10), 0);
        assert_eq!(even_odd.get(2, 2), 255);
    }

    #[test]
    fn half_pixel_edges_are_antialiased() {
        let outline = Outline::new(vec![rect(0.5, 0.0, 3.5, 2.0, true)]);
        let bitmap = GlyphRasterizer::default().rasterize(&outline, 1.0, 1.0).unwrap();
        assert_eq!(bitmap.width, 4);
        let left = bitmap.get(0, 0);
        let right = bitmap.get(3, 0);
        assert!((120..=135).contains(&left), "left edge {left}");
        assert!((120..=135).contains(&right), "right edge {right}");
        assert_eq!(bitmap.get(1, 0), 255);
    }

    #[test]
    fn scale_is_applied_per_axis() {
        let outline = Outline::new(vec![rect(0.0, 0.0, 100.0, 100.0, true)]);
        let bitmap = GlyphRasterizer::default().rasterize(&outline, 0.25, 0.5).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (25, 50));
    }

    #[test]
    fn degenerate_outlines_are_empty() {
        let rasterizer = GlyphRasterizer::default();
        assert!(rasterizer.rasterize(&Outline::default(), 1.0, 1.0).unwrap().is_empty());

        let single = Outline::new(vec![Contour {
            points: vec![OutlinePoint::on(4.0, 4.0)],
        }]);
        assert!(rasterizer.rasterize(&single, 1.0, 1.0).unwrap().is_empty());

        let square = Outline::new(vec![rect(0.0, 0.0, 10.0, 10.0, true)]);
        assert!(rasterizer.rasterize(&square, 0.0, 1.0).unwrap().is_empty());
        assert!(rasterizer.rasterize(&square, f32::NAN, 1.0).unwrap().is_empty());
    }

    #[test]
    fn curves_stay_inside_control_box() {
        // Quarter-circle-ish bump built from one off-curve point
        let outline = Outline::new(vec![Contour {
            points: vec![
                OutlinePoint::on(0.0, 0.0),
                OutlinePoint::off(0.0, 20.0),
                OutlinePoint::on(20.0, 20.0),
                OutlinePoint::on(20.0, 0.0),
            ],
        }]);
        let bitmap = GlyphRasterizer::default().rasterize(&outline, 1.0, 1.0).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (20, 20));
        // The corner cut off by the curve stays empty, the opposite one is full
        assert_eq!(bitmap.get(0, 0), 0);
        assert_eq!(bitmap.get(19, 19), 255);
    }

    #[test]
    fn all_off_curve_contour_closes() {
        let points = [
            (Point::new(0.0, 0.0), false),
            (Point::new(10.0, 0.0), false),
            (Point::new(10.0, 10.0), false),
            (Point::new(0.0, 10.0), false),
        ];
        let poly = flatten_contour(&points);
        assert!(poly.len() > 4);
        assert_eq!(poly[0], Point::new(0.0, 5.0));
        assert!(poly.iter().all(|p| (0.0..=10.0).contains(&p.x) && (0.0..=10.0).contains(&p.y)));
    }

    #[test]
    fn oversized_bitmaps_are_rejected() {
        let square = Outline::new(vec![rect(0.0, 0.0, 100.0, 100.0, true)]);
        let rasterizer = GlyphRasterizer::default().with_max_pixels(100);
        assert_eq!(rasterizer.rasterize(&square, 0.1, 0.1).unwrap().width, 10);
        assert!(matches!(
            rasterizer.rasterize(&square, 0.2, 0.1),
            Err(TextError::BitmapTooLarge { width: 20, height: 10, limit: 100 })
        ));

        // Far beyond addressable memory; must fail before allocating
        let huge = GlyphRasterizer::default().rasterize(&square, 1.0e7, 1.0e7);
        assert!(matches!(huge, Err(TextError::BitmapTooLarge { .. })));
    }

    #[test]
    fn add_span_partial_pixels() {
        let mut row = vec![0.0; 4];
        add_span(&mut row, 0.25, 2.5, 1.0);
        assert_eq!(row, vec![0.75, 1.0, 0.5, 0.0]);

        let mut row = vec![0.0; 2];
        add_span(&mut row, -3.0, 10.0, 0.5);
        assert_eq!(row, vec![0.5, 0.5]);
    }

    #[test]
    fn rasterization_is_deterministic() {
        let outline = ring(true, false);
        let rasterizer = GlyphRasterizer::default();
        let a = rasterizer.rasterize(&outline, 0.7, 0.7).unwrap();
        let b = rasterizer.rasterize(&outline, 0.7, 0.7).unwrap();
        assert_eq!(a, b);
    }
}

//! Signed distance field conversion
//!
//! Pixels with coverage >= 128 count as inside. For every pixel the Euclidean
//! distance to the nearest pixel of the opposite kind is found with a two-pass
//! 8-neighbour vector propagation (8SSEDT), shifted by half a pixel so the
//! zero crossing lies on the boundary between the two pixels, clamped to
//! `spread` and packed so that 128 is the edge, 255 is deep inside and 0 is
//! far outside.

use crate::rasterizer::GlyphBitmap;

const INSIDE_THRESHOLD: u8 = 128;

/// Larger than any distance in a realistic glyph bitmap, small enough that
/// squared lengths cannot overflow.
const FAR: i32 = 1 << 13;

#[derive(Clone, Copy)]
struct Offset {
    dx: i32,
    dy: i32,
}

impl Offset {
    const ZERO: Self = Self { dx: 0, dy: 0 };
    const FAR: Self = Self { dx: FAR, dy: FAR };

    fn length_sq(self) -> i64 {
        let dx = self.dx as i64;
        let dy = self.dy as i64;
        dx * dx + dy * dy
    }
}

struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Offset>,
}

impl Grid {
    /// Seeds every pixel where `is_target` holds with a zero offset.
    fn seeded(coverage: &[u8], width: usize, height: usize, is_target: impl Fn(u8) -> bool) -> Self {
        let cells = coverage
            .iter()
            .map(|&v| if is_target(v) { Offset::ZERO } else { Offset::FAR })
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    fn compare(&mut self, x: usize, y: usize, ox: i32, oy: i32) {
        let nx = x as i64 + ox as i64;
        let ny = y as i64 + oy as i64;
        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
            return;
        }
        let neighbour = self.cells[ny as usize * self.width + nx as usize];
        let candidate = Offset {
            dx: neighbour.dx + ox,
            dy: neighbour.dy + oy,
        };
        let cell = &mut self.cells[y * self.width + x];
        if candidate.length_sq() < cell.length_sq() {
            *cell = candidate;
        }
    }

    fn propagate(&mut self) {
        let (w, h) = (self.width, self.height);
        for y in 0..h {
            for x in 0..w {
                self.compare(x, y, -1, 0);
                self.compare(x, y, 0, -1);
                self.compare(x, y, -1, -1);
                self.compare(x, y, 1, -1);
            }
            for x in (0..w).rev() {
                self.compare(x, y, 1, 0);
            }
        }
        for y in (0..h).rev() {
            for x in (0..w).rev() {
                self.compare(x, y, 1, 0);
                self.compare(x, y, 0, 1);
                self.compare(x, y, -1, 1);
                self.compare(x, y, 1, 1);
            }
            for x in 0..w {
                self.compare(x, y, -1, 0);
            }
        }
    }

    fn distance(&self, index: usize) -> f32 {
        (self.cells[index].length_sq() as f32).sqrt()
    }
}

/// Converts a coverage bitmap into a signed distance field of the same size.
///
/// A bitmap with no inside pixels comes back as all zeros (fully outside).
/// Returns an empty field when `coverage` does not hold exactly
/// `width * height` values.
pub fn distance_field(coverage: &[u8], width: u32, height: u32, spread: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    if coverage.is_empty() || w.checked_mul(h) != Some(coverage.len()) {
        return Vec::new();
    }

    let mut to_inside = Grid::seeded(coverage, w, h, |v| v >= INSIDE_THRESHOLD);
    let mut to_outside = Grid::seeded(coverage, w, h, |v| v < INSIDE_THRESHOLD);
    to_inside.propagate();
    to_outside.propagate();

    let spread = spread.max(1) as f32;
    coverage
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let signed = if v >= INSIDE_THRESHOLD {
                to_outside.distance(i) - 0.5
            } else {
                -(to_inside.distance(i) - 0.5)
            };
            pack_distance(signed, spread)
        })
        .collect()
}

/// Maps `[-spread, spread]` onto `[0, 255]` with the edge at 128.
fn pack_distance(distance: f32, spread: f32) -> u8 {
    let clamped = distance.clamp(-spread, spread);
    (128.0 + clamped / spread * 128.0).round().clamp(0.0, 255.0) as u8
}

/// Surrounds a bitmap with `margin` empty pixels on every side, moving the
/// placement offsets so the glyph stays where it was. Empty bitmaps are
/// returned unchanged.
pub fn pad_bitmap(bitmap: &GlyphBitmap, margin: u32) -> GlyphBitmap {
    if bitmap.is_empty() || margin == 0 {
        return bitmap.clone();
    }

    let width = bitmap.width + margin * 2;
    let height = bitmap.height + margin * 2;
    let mut data = vec![0u8; (width * height) as usize];
    let src_w = bitmap.width as usize;
    for (y, row) in bitmap.data.chunks_exact(src_w).enumerate() {
        let start = (y + margin as usize) * width as usize + margin as usize;
        data[start..start + src_w].copy_from_slice(row);
    }

    GlyphBitmap {
        data,
        width,
        height,
        xoff: bitmap.xoff - margin as i32,
        yoff: bitmap.yoff + margin as i32,
        advance: bitmap.advance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32, inset: u32) -> Vec<u8> {
        let mut data = vec![0u8; (size * size) as usize];
        for y in inset..size - inset {
            for x in inset..size - inset {
                data[(y * size + x) as usize] = 255;
            }
        }
        data
    }

    #[test]
    fn empty_bitmap_is_fully_outside() {
        let field = distance_field(&[0u8; 48], 8, 6, 4);
        assert_eq!(field.len(), 48);
        assert!(field.iter().all(|&v| v == 0));
    }

    #[test]
    fn full_bitmap_is_fully_inside() {
        let field = distance_field(&[255u8; 16], 4, 4, 4);
        assert!(field.iter().all(|&v| v == 255));
    }

    #[test]
    fn edge_is_centered() {
        let data = square(16, 4);
        let field = distance_field(&data, 16, 16, 4);
        // Pixels either side of the left edge on the middle row
        let inside = field[8 * 16 + 4];
        let outside = field[8 * 16 + 3];
        assert_eq!(inside, 144);
        assert_eq!(outside, 112);
    }

    #[test]
    fn distance_grows_away_from_edge() {
        let data = square(32, 8);
        let field = distance_field(&data, 32, 32, 4);
        let row = &field[16 * 32..17 * 32];
        // Monotonic from far outside to the center
        for x in 0..16 {
            assert!(row[x] <= row[x + 1], "x={x}: {} > {}", row[x], row[x + 1]);
        }
        assert_eq!(row[0], 0);
        assert_eq!(row[16], 255);
    }

    #[test]
    fn diagonal_distances_are_euclidean() {
        let mut data = vec![0u8; 25];
        data[0] = 255;
        let field = distance_field(&data, 5, 5, 8);
        // (3, 4) is 5 pixels from the only inside pixel
        let expected = pack_distance(-(5.0 - 0.5), 8.0);
        assert_eq!(field[4 * 5 + 3], expected);
    }

    #[test]
    fn mismatched_dimensions_give_empty_field() {
        assert!(distance_field(&[0; 3], 2, 2, 4).is_empty());
        assert!(distance_field(&[255; 5], 2, 2, 4).is_empty());
        assert!(distance_field(&[], 0, 0, 4).is_empty());
        assert!(distance_field(&[0; 4], u32::MAX, u32::MAX, 4).is_empty());
    }

    #[test]
    fn threshold_is_128() {
        let field = distance_field(&[127, 128], 2, 1, 4);
        assert!(field[0] < 128);
        assert!(field[1] > 128);
    }

    #[test]
    fn padding_keeps_glyph_in_place() {
        let bitmap = GlyphBitmap {
            data: vec![1, 2, 3, 4, 5, 6],
            width: 3,
            height: 2,
            xoff: 1,
            yoff: 7,
            advance: 9,
        };
        let padded = pad_bitmap(&bitmap, 2);
        assert_eq!((padded.width, padded.height), (7, 6));
        assert_eq!((padded.xoff, padded.yoff), (-1, 9));
        assert_eq!(padded.advance, 9);
        assert_eq!(padded.get(2, 2), 1);
        assert_eq!(padded.get(4, 3), 6);
        assert_eq!(padded.get(0, 0), 0);
        assert_eq!(padded.data.iter().map(|&v| v as u32).sum::<u32>(), 21);

        assert_eq!(pad_bitmap(&GlyphBitmap::empty(5), 4), GlyphBitmap::empty(5));
    }
}

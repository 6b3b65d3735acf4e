//! Font loading and glyph access
//!
//! A `Font` owns the bytes of a TrueType file (or one face of a collection)
//! together with the parsed header tables. Glyph lookups, metrics and outline
//! decoding read straight from those bytes. Dropping the font releases them.

use crate::outline::{GlyphSource, Outline};
use crate::rasterizer::{FillRule, GlyphBitmap, GlyphRasterizer};
use crate::tables::{self, CmapSubtable, Head, Hhea, Maxp, TableDirectory, TableTag};
use crate::{Result, TextError};
use std::ops::Range;
use std::path::Path;

/// Index of a glyph inside a font. 0 is `.notdef`.
pub type GlyphId = u16;

/// Face-wide metrics in font design units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    /// Units per em (typically 1000 or 2048)
    pub units_per_em: u16,
    /// Distance from baseline to the top of the tallest glyph
    pub ascender: i16,
    /// Distance from baseline to the bottom, typically negative
    pub descender: i16,
    /// Additional spacing between lines
    pub line_gap: i16,
    /// Number of glyphs in the face
    pub num_glyphs: u16,
}

impl FontMetrics {
    /// Line height in font units
    pub fn line_height(&self) -> i32 {
        self.ascender as i32 - self.descender as i32 + self.line_gap as i32
    }

    /// Scale a value from font units to pixels
    pub fn scale(&self, value: i32, pixel_height: f32) -> f32 {
        value as f32 * pixel_height / self.units_per_em as f32
    }

    pub fn ascender_px(&self, pixel_height: f32) -> f32 {
        self.scale(self.ascender as i32, pixel_height)
    }

    pub fn descender_px(&self, pixel_height: f32) -> f32 {
        self.scale(self.descender as i32, pixel_height)
    }

    pub fn line_height_px(&self, pixel_height: f32) -> f32 {
        self.scale(self.line_height(), pixel_height)
    }
}

/// A parsed TrueType face
pub struct Font {
    data: Vec<u8>,
    face_index: u32,
    head: Head,
    hhea: Hhea,
    num_glyphs: u16,
    cmap: Range<usize>,
    cmap_subtable: CmapSubtable,
    hmtx: Range<usize>,
    loca: Range<usize>,
    glyf: Range<usize>,
}

impl Font {
    /// Load the first face of a font file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| TextError::FontLoad(format!("{}: {}", path.display(), e)))?;
        let font = Self::from_data(data)?;
        tracing::debug!(
            path = %path.display(),
            glyphs = font.num_glyphs,
            units_per_em = font.head.units_per_em,
            "loaded font"
        );
        Ok(font)
    }

    /// Parse a font from raw TTF data (uses face index 0)
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        Self::from_data_with_index(data, 0)
    }

    /// Parse a font from raw TTF/TTC data with a specific face index
    ///
    /// For TrueType collections, different indices select different faces.
    /// Every table needed for outline rendering must be present.
    pub fn from_data_with_index(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let directory = TableDirectory::parse(&data, face_index)?;

        let head = Head::parse(&data[directory.require(TableTag::HEAD)?])?;
        let hhea = Hhea::parse(&data[directory.require(TableTag::HHEA)?])?;
        let maxp = Maxp::parse(&data[directory.require(TableTag::MAXP)?])?;
        let cmap = directory.require(TableTag::CMAP)?;
        let hmtx = directory.require(TableTag::HMTX)?;
        let loca = directory.require(TableTag::LOCA)?;
        let glyf = directory.require(TableTag::GLYF)?;

        if hhea.num_h_metrics > maxp.num_glyphs {
            return Err(TextError::FontParse(format!(
                "hhea lists {} metrics for {} glyphs",
                hhea.num_h_metrics, maxp.num_glyphs
            )));
        }
        let cmap_subtable = CmapSubtable::select(&data[cmap.clone()])?;

        Ok(Self {
            data,
            face_index,
            head,
            hhea,
            num_glyphs: maxp.num_glyphs,
            cmap,
            cmap_subtable,
            hmtx,
            loca,
            glyf,
        })
    }

    /// Raw font data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    pub fn metrics(&self) -> FontMetrics {
        FontMetrics {
            units_per_em: self.head.units_per_em,
            ascender: self.hhea.ascender,
            descender: self.hhea.descender,
            line_gap: self.hhea.line_gap,
            num_glyphs: self.num_glyphs,
        }
    }

    /// Factor converting design units to pixels for a given pixel height
    pub fn scale_for_pixel_height(&self, pixel_height: f32) -> f32 {
        pixel_height / self.head.units_per_em as f32
    }

    /// Glyph for a character, or 0 (`.notdef`) when the font does not map it
    pub fn find_glyph_index(&self, c: char) -> GlyphId {
        let glyph = self.cmap_subtable.lookup(&self.data[self.cmap.clone()], c as u32);
        if glyph >= self.num_glyphs {
            0
        } else {
            glyph
        }
    }

    /// Horizontal advance in design units. Missing metrics read as 0.
    pub fn glyph_advance(&self, glyph: GlyphId) -> u16 {
        self.hmetric(glyph).advance_width
    }

    pub fn glyph_left_side_bearing(&self, glyph: GlyphId) -> i16 {
        self.hmetric(glyph).left_side_bearing
    }

    fn hmetric(&self, glyph: GlyphId) -> tables::HMetric {
        tables::hmetric(&self.data[self.hmtx.clone()], self.hhea.num_h_metrics, glyph)
            .unwrap_or_default()
    }

    /// Decoded outline of a glyph in design units
    pub fn glyph_outline(&self, glyph: GlyphId) -> Result<Outline> {
        self.glyph_source().outline(glyph)
    }

    fn glyph_source(&self) -> GlyphSource<'_> {
        GlyphSource {
            glyf: &self.data[self.glyf.clone()],
            loca: &self.data[self.loca.clone()],
            long_loca: self.head.long_loca,
            num_glyphs: self.num_glyphs,
        }
    }

    /// Rasterizes a glyph with the non-zero fill rule. Glyphs without
    /// contours produce an empty bitmap that still carries the advance.
    pub fn glyph_bitmap(&self, glyph: GlyphId, scale_x: f32, scale_y: f32) -> Result<GlyphBitmap> {
        self.glyph_bitmap_with_rule(glyph, scale_x, scale_y, FillRule::NonZero)
    }

    pub fn glyph_bitmap_with_rule(
        &self,
        glyph: GlyphId,
        scale_x: f32,
        scale_y: f32,
        fill_rule: FillRule,
    ) -> Result<GlyphBitmap> {
        let outline = self.glyph_outline(glyph)?;
        let mut bitmap = GlyphRasterizer::new(fill_rule).rasterize(&outline, scale_x, scale_y)?;
        bitmap.advance = (self.glyph_advance(glyph) as f32 * scale_x) as i32;
        Ok(bitmap)
    }
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.head.units_per_em)
            .field("num_glyphs", &self.num_glyphs)
            .field("cmap_format", &self.cmap_subtable.format)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, GLYPH_D, GLYPH_H, GLYPH_I, GLYPH_O, GLYPH_SPACE};

    #[test]
    fn parses_synthetic_font() {
        let font = testing::test_font();
        assert_eq!(font.num_glyphs(), testing::NUM_GLYPHS);
        assert_eq!(font.units_per_em(), testing::UNITS_PER_EM);
        assert_eq!(font.face_index(), 0);

        let metrics = font.metrics();
        assert_eq!(metrics.ascender, testing::ASCENDER);
        assert_eq!(metrics.descender, testing::DESCENDER);
        assert_eq!(metrics.line_height(), 1000);
        assert_eq!(metrics.ascender_px(50.0), 40.0);
    }

    #[test]
    fn scale_uses_units_per_em() {
        let font = testing::test_font();
        assert_eq!(font.scale_for_pixel_height(500.0), 0.5);
    }

    #[test]
    fn glyph_lookup() {
        let font = testing::test_font();
        assert_eq!(font.find_glyph_index('O'), GLYPH_O);
        assert_eq!(font.find_glyph_index(' '), GLYPH_SPACE);
        assert_eq!(font.find_glyph_index(testing::ASTRAL), GLYPH_I);
        assert_eq!(font.find_glyph_index('q'), 0);
    }

    #[test]
    fn advances_and_bearings() {
        let font = testing::test_font();
        assert_eq!(font.glyph_advance(GLYPH_O), 700);
        assert_eq!(font.glyph_advance(GLYPH_SPACE), testing::SPACE_ADVANCE);
        assert_eq!(font.glyph_left_side_bearing(GLYPH_I), 100);
        // Past the end of hmtx
        assert_eq!(font.glyph_advance(500), 0);
    }

    #[test]
    fn bar_bitmap_geometry() {
        let font = testing::test_font();
        let bitmap = font.glyph_bitmap(GLYPH_I, 0.25, 0.25).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (25, 175));
        assert_eq!((bitmap.xoff, bitmap.yoff), (25, 175));
        assert_eq!(bitmap.advance, 75);
        assert!(bitmap.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn hole_in_o_is_empty() {
        let font = testing::test_font();
        let bitmap = font.glyph_bitmap(GLYPH_O, 0.25, 0.25).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (125, 175));
        // Center of the counter and a point on the left stem
        assert_eq!(bitmap.get(62, 87), 0);
        assert_eq!(bitmap.get(10, 87), 255);
    }

    #[test]
    fn curved_and_composite_glyphs() {
        let font = testing::test_font();
        let d = font.glyph_bitmap(GLYPH_D, 0.25, 0.25).unwrap();
        assert_eq!((d.width, d.height), (125, 175));
        // The bowl is rounded away from the top right corner
        assert_eq!(d.get(124, 0), 0);
        assert_eq!(d.get(5, 5), 255);

        let h = font.glyph_bitmap(GLYPH_H, 0.25, 0.25).unwrap();
        // Two bars: x 25..50 and 100..125 in pixels
        assert_eq!(h.xoff, 25);
        assert_eq!(h.width, 100);
        assert_eq!(h.get(10, 50), 255);
        assert_eq!(h.get(40, 50), 0);
        assert_eq!(h.get(90, 50), 255);
    }

    #[test]
    fn space_is_empty_with_advance() {
        let font = testing::test_font();
        let bitmap = font.glyph_bitmap(GLYPH_SPACE, 0.1, 0.1).unwrap();
        assert!(bitmap.is_empty());
        assert_eq!(bitmap.advance, 25);
    }

    #[test]
    fn corrupt_glyph_is_an_error() {
        let font = testing::test_font();
        assert!(matches!(
            font.glyph_bitmap(testing::GLYPH_CORRUPT, 0.1, 0.1),
            Err(TextError::GlyphParse { glyph: testing::GLYPH_CORRUPT, .. })
        ));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let path = testing::temp_path("does-not-exist.ttf");
        assert!(matches!(Font::load(&path), Err(TextError::FontLoad(_))));
    }

    #[test]
    fn loads_from_disk() {
        let path = testing::write_temp_font("font-load");
        let font = Font::load(&path).unwrap();
        assert_eq!(font.num_glyphs(), testing::NUM_GLYPHS);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_table_is_rejected() {
        let data = testing::assemble(&[(*b"head", vec![0u8; 54])]);
        let err = Font::from_data(data).unwrap_err();
        assert!(matches!(err, TextError::FontParse(_)));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let mut data = testing::test_font_data();
        data.truncate(40);
        assert!(Font::from_data(data).is_err());
        assert!(Font::from_data(Vec::new()).is_err());
    }

    #[test]
    fn bitmaps_are_deterministic() {
        let font = testing::test_font();
        let a = font.glyph_bitmap(GLYPH_D, 0.13, 0.13).unwrap();
        let b = font.glyph_bitmap(GLYPH_D, 0.13, 0.13).unwrap();
        assert_eq!(a, b);
    }
}

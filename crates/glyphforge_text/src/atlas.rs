//! Glyph atlas building
//!
//! Rasterizes every character of a charset and packs the bitmaps into one RGB
//! image using row (shelf) packing. Glyphs are placed tallest first; every
//! glyph in a row is aligned to a shared baseline. When the glyphs do not fit,
//! both dimensions are doubled and packing starts again from a fresh state,
//! up to a bounded number of attempts and a maximum size. Geometry is settled before anything is
//! drawn, so the image is allocated and filled once.

use crate::charset::{self, CharEncoding};
use crate::font::Font;
use crate::image_buffer::Image;
use crate::rasterizer::{FillRule, GlyphBitmap};
use crate::sdf;
use crate::{Result, TextError};
use rustc_hash::FxHashMap;
use std::io::{self, Write};
use std::path::Path;

/// Smallest power of two that is `>= value` (1 for 0)
pub fn next_pow2(value: u32) -> u32 {
    value.max(1).next_power_of_two()
}

/// Atlas build parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasConfig {
    /// Lower bound for the atlas width (rounded up to a power of two)
    pub min_width: u32,
    /// Lower bound for the atlas height (rounded up to a power of two)
    pub min_height: u32,
    /// Largest atlas width growth may reach
    pub max_width: u32,
    /// Largest atlas height growth may reach
    pub max_height: u32,
    /// Empty pixels around every glyph
    pub padding: u32,
    /// Distance in pixels covered by the signed distance field
    pub sdf_spread: u32,
    /// Added to the estimated side length before rounding up
    pub size_margin: u32,
    /// Number of times the atlas may double before giving up
    pub max_grow_attempts: u32,
    /// Advance of placeholder entries as a fraction of the pixel height
    pub fallback_advance_ratio: f32,
    pub fill_rule: FillRule,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            min_width: 2048,
            min_height: 2048,
            max_width: 16384,
            max_height: 16384,
            padding: 4,
            sdf_spread: 4,
            size_margin: 256,
            max_grow_attempts: 8,
            fallback_advance_ratio: 0.5,
            fill_rule: FillRule::NonZero,
        }
    }
}

impl AtlasConfig {
    pub fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_sdf_spread(mut self, spread: u32) -> Self {
        self.sdf_spread = spread;
        self
    }

    pub fn with_size_margin(mut self, margin: u32) -> Self {
        self.size_margin = margin;
        self
    }

    pub fn with_max_grow_attempts(mut self, attempts: u32) -> Self {
        self.max_grow_attempts = attempts;
        self
    }

    pub fn with_fallback_advance_ratio(mut self, ratio: f32) -> Self {
        self.fallback_advance_ratio = ratio;
        self
    }

    pub fn with_fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = fill_rule;
        self
    }
}

/// Placement and metrics of one character in the atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasChar {
    pub codepoint: char,
    /// Position of the bitmap in the atlas (pixels)
    pub x: u32,
    pub y: u32,
    /// Bitmap size; 0 for blank glyphs and placeholders
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the left edge of the bitmap
    pub xoff: i32,
    /// Distance from the baseline up to the top of the bitmap
    pub yoff: i32,
    /// Horizontal advance in pixels
    pub advance: i32,
}

impl AtlasChar {
    /// Blank entries advance the pen but have nothing to draw
    pub fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// UV coordinates `[u_min, v_min, u_max, v_max]` for this entry
    pub fn uv_bounds(&self, atlas_width: u32, atlas_height: u32) -> [f32; 4] {
        let u_min = self.x as f32 / atlas_width as f32;
        let v_min = self.y as f32 / atlas_height as f32;
        let u_max = (self.x + self.width) as f32 / atlas_width as f32;
        let v_max = (self.y + self.height) as f32 / atlas_height as f32;
        [u_min, v_min, u_max, v_max]
    }

    fn overlaps(&self, other: &AtlasChar) -> bool {
        !self.is_blank()
            && !other.is_blank()
            && self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Hash index over an atlas' entries
#[derive(Debug, Clone)]
pub struct CharLookup<'a> {
    chars: &'a [AtlasChar],
    index: FxHashMap<char, usize>,
}

impl<'a> CharLookup<'a> {
    pub fn new(chars: &'a [AtlasChar]) -> Self {
        let mut index = FxHashMap::default();
        for (i, ch) in chars.iter().enumerate() {
            index.entry(ch.codepoint).or_insert(i);
        }
        Self { chars, index }
    }

    pub fn get(&self, c: char) -> Option<&'a AtlasChar> {
        self.index.get(&c).map(|&i| &self.chars[i])
    }

    /// `c`, or `fallback` when the atlas does not contain `c`
    pub fn get_or(&self, c: char, fallback: char) -> Option<&'a AtlasChar> {
        self.get(c).or_else(|| self.get(fallback))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// A packed glyph atlas: the image plus one entry per charset character
pub struct GlyphAtlas {
    image: Image,
    chars: Vec<AtlasChar>,
    pixel_height: f32,
    encoding: CharEncoding,
    sdf: bool,
}

/// A rasterized glyph waiting to be placed
struct PendingGlyph {
    codepoint: char,
    bitmap: GlyphBitmap,
}

impl GlyphAtlas {
    /// Builds an atlas with the default configuration.
    ///
    /// `charset` defaults to printable ASCII. Characters the font does not
    /// map and glyphs that fail to parse get blank placeholder entries.
    pub fn create(
        font_path: impl AsRef<Path>,
        pixel_height: f32,
        charset: Option<&[u8]>,
        encoding: CharEncoding,
        use_sdf: bool,
    ) -> Result<Self> {
        Self::create_with_config(
            font_path,
            pixel_height,
            charset,
            encoding,
            use_sdf,
            &AtlasConfig::default(),
        )
    }

    pub fn create_with_config(
        font_path: impl AsRef<Path>,
        pixel_height: f32,
        charset: Option<&[u8]>,
        encoding: CharEncoding,
        use_sdf: bool,
        config: &AtlasConfig,
    ) -> Result<Self> {
        let font = Font::load(font_path)?;
        Self::from_font(&font, pixel_height, charset, encoding, use_sdf, config)
    }

    /// Builds an atlas from an already loaded font
    pub fn from_font(
        font: &Font,
        pixel_height: f32,
        charset: Option<&[u8]>,
        encoding: CharEncoding,
        use_sdf: bool,
        config: &AtlasConfig,
    ) -> Result<Self> {
        if !pixel_height.is_finite() || pixel_height <= 0.0 {
            return Err(TextError::InvalidPixelHeight(pixel_height));
        }

        let codepoints = charset::decode_charset(
            charset.unwrap_or(charset::PRINTABLE_ASCII.as_bytes()),
            encoding,
        );
        if codepoints.is_empty() {
            return Err(TextError::EmptyCharset);
        }

        let glyphs = rasterize_charset(font, &codepoints, pixel_height, use_sdf, config);
        let sizes: Vec<GlyphSize> = glyphs.iter().map(|g| GlyphSize::of(&g.bitmap)).collect();
        let (width, height) = initial_size(&sizes, config);
        let packing = pack_with_growth(&sizes, width, height, config)?;

        let mut image = Image::new(packing.width, packing.height)?;
        let chars = glyphs
            .iter()
            .zip(&packing.positions)
            .map(|(glyph, &(x, y))| {
                let bitmap = &glyph.bitmap;
                if !bitmap.is_empty() {
                    image.blit_gray(&bitmap.data, bitmap.width, bitmap.height, x, y);
                }
                AtlasChar {
                    codepoint: glyph.codepoint,
                    x,
                    y,
                    width: bitmap.width,
                    height: bitmap.height,
                    xoff: bitmap.xoff,
                    yoff: bitmap.yoff,
                    advance: bitmap.advance,
                }
            })
            .collect();

        let atlas = Self {
            image,
            chars,
            pixel_height,
            encoding,
            sdf: use_sdf,
        };
        tracing::debug!(
            width = atlas.width(),
            height = atlas.height(),
            chars = atlas.num_chars(),
            attempts = packing.attempts,
            sdf = use_sdf,
            "built glyph atlas"
        );
        Ok(atlas)
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn chars(&self) -> &[AtlasChar] {
        &self.chars
    }

    pub fn num_chars(&self) -> usize {
        self.chars.len()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_height(&self) -> f32 {
        self.pixel_height
    }

    pub fn encoding(&self) -> CharEncoding {
        self.encoding
    }

    pub fn is_sdf(&self) -> bool {
        self.sdf
    }

    /// Linear search for a character's entry
    pub fn find_char(&self, c: char) -> Option<&AtlasChar> {
        self.chars.iter().find(|ch| ch.codepoint == c)
    }

    /// Hash index for callers with many lookups
    pub fn lookup(&self) -> CharLookup<'_> {
        CharLookup::new(&self.chars)
    }

    /// Share of the atlas area covered by glyph bitmaps (0.0 to 1.0)
    pub fn utilization(&self) -> f32 {
        let used: u64 = self
            .chars
            .iter()
            .map(|c| c.width as u64 * c.height as u64)
            .sum();
        used as f32 / (self.width() as u64 * self.height() as u64) as f32
    }

    pub fn metadata(&self) -> AtlasMetadata {
        AtlasMetadata {
            pixel_height: self.pixel_height,
            atlas_width: self.width(),
            atlas_height: self.height(),
            chars: self.chars.clone(),
        }
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.write_png(path)
    }

    pub fn save_bmp(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.write_bmp(path)
    }

    pub fn save_metadata(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut out = io::BufWriter::new(file);
        self.metadata().write(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Logs the atlas summary at info level and every entry at debug level
    pub fn log_info(&self) {
        tracing::info!(
            width = self.width(),
            height = self.height(),
            pixel_height = self.pixel_height,
            chars = self.num_chars(),
            sdf = self.sdf,
            utilization = %format!("{:.1}%", self.utilization() * 100.0),
            "glyph atlas"
        );
        for c in &self.chars {
            tracing::debug!(
                "  {:?} (U+{:04X}): pos=({},{}) size=({}x{}) offset=({},{}) advance={}",
                c.codepoint,
                c.codepoint as u32,
                c.x,
                c.y,
                c.width,
                c.height,
                c.xoff,
                c.yoff,
                c.advance
            );
        }
    }
}

impl std::fmt::Debug for GlyphAtlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphAtlas")
            .field("dimensions", &(self.width(), self.height()))
            .field("chars", &self.chars.len())
            .field("pixel_height", &self.pixel_height)
            .field("sdf", &self.sdf)
            .field(
                "utilization",
                &format!("{:.1}%", self.utilization() * 100.0),
            )
            .finish()
    }
}

/// Rasterizes every codepoint, substituting blank placeholders for
/// unmapped characters and glyphs that fail to decode.
fn rasterize_charset(
    font: &Font,
    codepoints: &[char],
    pixel_height: f32,
    use_sdf: bool,
    config: &AtlasConfig,
) -> Vec<PendingGlyph> {
    let scale = font.scale_for_pixel_height(pixel_height);
    let fallback_advance = (pixel_height * config.fallback_advance_ratio) as i32;

    codepoints
        .iter()
        .map(|&codepoint| {
            let glyph = font.find_glyph_index(codepoint);
            let bitmap = if glyph == 0 {
                tracing::debug!(?codepoint, "character not in font, using placeholder");
                GlyphBitmap::empty(fallback_advance)
            } else {
                match font.glyph_bitmap_with_rule(glyph, scale, scale, config.fill_rule) {
                    Ok(bitmap) if use_sdf && !bitmap.is_empty() => {
                        let mut padded = sdf::pad_bitmap(&bitmap, config.sdf_spread);
                        padded.data = sdf::distance_field(
                            &padded.data,
                            padded.width,
                            padded.height,
                            config.sdf_spread,
                        );
                        padded
                    }
                    Ok(bitmap) => bitmap,
                    Err(err) => {
                        tracing::warn!(?codepoint, glyph, %err, "failed to rasterize glyph, using placeholder");
                        GlyphBitmap::empty(fallback_advance)
                    }
                }
            };
            PendingGlyph { codepoint, bitmap }
        })
        .collect()
}

/// Packing input for one glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GlyphSize {
    width: u32,
    height: u32,
    yoff: i32,
}

impl GlyphSize {
    fn of(bitmap: &GlyphBitmap) -> Self {
        Self {
            width: bitmap.width,
            height: bitmap.height,
            yoff: bitmap.yoff,
        }
    }

    fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// `next_pow2(sqrt(total_width * max_height) + margin)`, floored at the
/// configured minimum on each axis.
fn initial_size(sizes: &[GlyphSize], config: &AtlasConfig) -> (u32, u32) {
    let total_width: u64 = sizes
        .iter()
        .map(|s| s.width as u64 + config.padding as u64)
        .sum();
    let max_height = sizes.iter().map(|s| s.height).max().unwrap_or(0) as u64;
    let estimate = ((total_width * max_height) as f64).sqrt().ceil() as u64 + config.size_margin as u64;
    let side = u32::try_from(estimate).unwrap_or(u32::MAX);
    (
        next_pow2(side.max(config.min_width)),
        next_pow2(side.max(config.min_height)),
    )
}

/// Result of a successful packing
#[derive(Debug, Clone, PartialEq, Eq)]
struct Packing {
    width: u32,
    height: u32,
    /// Top-left corner per glyph, in input order; `(0, 0)` for blank glyphs
    positions: Vec<(u32, u32)>,
    attempts: u32,
}

/// Packs at the given size, doubling both dimensions after every failed
/// attempt until it fits, the growth budget runs out or the next size would
/// pass the configured maximum.
fn pack_with_growth(sizes: &[GlyphSize], width: u32, height: u32, config: &AtlasConfig) -> Result<Packing> {
    let within_max = |w: u32, h: u32| w <= config.max_width && h <= config.max_height;
    if !within_max(width, height) {
        return Err(TextError::AtlasFull {
            attempts: 0,
            width,
            height,
        });
    }

    // Tallest first; the stable sort keeps charset order among equal heights
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].height.cmp(&sizes[a].height));

    let (mut width, mut height) = (width, height);
    let max_attempts = config.max_grow_attempts.saturating_add(1);
    let mut attempt = 1;
    loop {
        if let Some(positions) = PackState::new(width, height, config.padding).pack(sizes, &order) {
            return Ok(Packing {
                width,
                height,
                positions,
                attempts: attempt,
            });
        }
        if attempt == max_attempts {
            break;
        }
        let grown = width.checked_mul(2).zip(height.checked_mul(2));
        let Some((w, h)) = grown.filter(|&(w, h)| within_max(w, h)) else {
            tracing::warn!(width, height, max_width = config.max_width, max_height = config.max_height, "atlas cannot grow further");
            break;
        };
        tracing::warn!(from = ?(width, height), to = ?(w, h), attempt, "glyphs do not fit, growing atlas");
        width = w;
        height = h;
        attempt += 1;
    }

    Err(TextError::AtlasFull {
        attempts: attempt,
        width,
        height,
    })
}

/// Row packing state for a single attempt
struct PackState {
    width: u32,
    height: u32,
    padding: u32,
    pen_x: u32,
    pen_y: u32,
    /// Glyphs of the open row with their x positions
    row: Vec<(usize, u32)>,
    positions: Vec<(u32, u32)>,
}

impl PackState {
    fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
            pen_x: padding,
            pen_y: padding,
            row: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Places every glyph in `order`, or returns `None` if they do not fit.
    fn pack(mut self, sizes: &[GlyphSize], order: &[usize]) -> Option<Vec<(u32, u32)>> {
        self.positions = vec![(0, 0); sizes.len()];
        for &i in order {
            let size = sizes[i];
            if size.is_blank() {
                continue;
            }
            if self.padding as u64 * 2 + size.width as u64 > self.width as u64 {
                return None;
            }
            if self.pen_x as u64 + size.width as u64 + self.padding as u64 > self.width as u64 {
                self.close_row(sizes)?;
            }
            self.row.push((i, self.pen_x));
            self.pen_x += size.width + self.padding;
        }
        self.close_row(sizes)?;
        Some(self.positions)
    }

    /// Aligns the open row on its lowest baseline and moves below it.
    fn close_row(&mut self, sizes: &[GlyphSize]) -> Option<()> {
        if self.row.is_empty() {
            return Some(());
        }
        let baseline = self.row.iter().map(|&(i, _)| sizes[i].yoff as i64).max()?;
        let extent = self
            .row
            .iter()
            .map(|&(i, _)| baseline - sizes[i].yoff as i64 + sizes[i].height as i64)
            .max()?;
        if self.pen_y as i64 + extent + self.padding as i64 > self.height as i64 {
            return None;
        }

        for &(i, x) in &self.row {
            let y = self.pen_y as i64 + baseline - sizes[i].yoff as i64;
            self.positions[i] = (x, y as u32);
        }
        self.pen_y += extent as u32 + self.padding;
        self.pen_x = self.padding;
        self.row.clear();
        Some(())
    }
}

/// Atlas geometry in the plain text interchange format
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasMetadata {
    pub pixel_height: f32,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub chars: Vec<AtlasChar>,
}

impl AtlasMetadata {
    /// Writes the header lines followed by one
    /// `codepoint x y width height xoff yoff advance` line per character.
    ///
    /// `pixel_height` is written with two decimals, so reading the text back
    /// only reproduces it to that precision. Every other field is exact.
    pub fn write<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "# Font Atlas Metadata")?;
        writeln!(out, "pixel_height: {:.2}", self.pixel_height)?;
        writeln!(out, "atlas_width: {}", self.atlas_width)?;
        writeln!(out, "atlas_height: {}", self.atlas_height)?;
        writeln!(out, "num_chars: {}", self.chars.len())?;
        writeln!(out)?;
        writeln!(out, "# codepoint x y width height xoff yoff advance")?;
        for c in &self.chars {
            writeln!(
                out,
                "{} {} {} {} {} {} {} {}",
                c.codepoint as u32, c.x, c.y, c.width, c.height, c.xoff, c.yoff, c.advance
            )?;
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Parses the text format. Blank lines and `#` comments are ignored;
    /// all four header fields are required and `num_chars` must match the
    /// number of character lines.
    pub fn parse(text: &str) -> Result<Self> {
        let mut pixel_height = None;
        let mut atlas_width = None;
        let mut atlas_height = None;
        let mut num_chars: Option<usize> = None;
        let mut chars = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let error = |reason: String| TextError::Metadata { line: line_no, reason };

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "pixel_height" => pixel_height = Some(parse_field::<f32>(value, "pixel_height").map_err(error)?),
                    "atlas_width" => atlas_width = Some(parse_field::<u32>(value, "atlas_width").map_err(error)?),
                    "atlas_height" => atlas_height = Some(parse_field::<u32>(value, "atlas_height").map_err(error)?),
                    "num_chars" => num_chars = Some(parse_field::<usize>(value, "num_chars").map_err(error)?),
                    other => return Err(error(format!("unknown header '{other}'"))),
                }
                continue;
            }

            chars.push(parse_char_line(line).map_err(error)?);
        }

        let missing = |name: &str| TextError::Metadata {
            line: 0,
            reason: format!("missing '{name}' header"),
        };
        let metadata = Self {
            pixel_height: pixel_height.ok_or_else(|| missing("pixel_height"))?,
            atlas_width: atlas_width.ok_or_else(|| missing("atlas_width"))?,
            atlas_height: atlas_height.ok_or_else(|| missing("atlas_height"))?,
            chars,
        };
        let expected = num_chars.ok_or_else(|| missing("num_chars"))?;
        if expected != metadata.chars.len() {
            return Err(TextError::Metadata {
                line: 0,
                reason: format!(
                    "num_chars is {expected} but {} characters are listed",
                    metadata.chars.len()
                ),
            });
        }
        Ok(metadata)
    }

    pub fn find_char(&self, c: char) -> Option<&AtlasChar> {
        self.chars.iter().find(|ch| ch.codepoint == c)
    }

    /// Entries whose rectangle reaches outside the atlas
    pub fn out_of_bounds(&self) -> Vec<&AtlasChar> {
        self.chars
            .iter()
            .filter(|c| {
                !c.is_blank()
                    && (c.x as u64 + c.width as u64 > self.atlas_width as u64
                        || c.y as u64 + c.height as u64 > self.atlas_height as u64)
            })
            .collect()
    }

    /// Pairs of non-blank entries whose rectangles intersect
    pub fn overlapping_pairs(&self) -> Vec<(&AtlasChar, &AtlasChar)> {
        let mut pairs = Vec::new();
        for (i, a) in self.chars.iter().enumerate() {
            for b in &self.chars[i + 1..] {
                if a.overlaps(b) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &str) -> std::result::Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {name} value '{value}'"))
}

fn parse_char_line(line: &str) -> std::result::Result<AtlasChar, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [codepoint, x, y, width, height, xoff, yoff, advance] = fields[..] else {
        return Err(format!("expected 8 fields, found {}", fields.len()));
    };
    let value = parse_field::<u32>(codepoint, "codepoint")?;
    let codepoint =
        char::from_u32(value).ok_or_else(|| format!("{value} is not a Unicode scalar value"))?;

    Ok(AtlasChar {
        codepoint,
        x: parse_field(x, "x")?,
        y: parse_field(y, "y")?,
        width: parse_field(width, "width")?,
        height: parse_field(height, "height")?,
        xoff: parse_field(xoff, "xoff")?,
        yoff: parse_field(yoff, "yoff")?,
        advance: parse_field(advance, "advance")?,
    })
}

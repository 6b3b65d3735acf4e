//! sfnt table parsing
//!
//! Parses the table directory and the tables needed to map characters to
//! glyphs and measure them: `head`, `hhea`, `maxp`, `hmtx`, `loca` and `cmap`
//! (formats 0, 4, 6 and 12). Outline data in `glyf` lives in `outline`.

use crate::reader::{FontReader, ReadError};
use crate::{Result, TextError};
use std::fmt;
use std::ops::Range;

impl From<ReadError> for TextError {
    fn from(err: ReadError) -> Self {
        TextError::FontParse(err.to_string())
    }
}

/// A 4-byte table tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableTag(pub [u8; 4]);

impl TableTag {
    pub const HEAD: Self = Self(*b"head");
    pub const HHEA: Self = Self(*b"hhea");
    pub const MAXP: Self = Self(*b"maxp");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const CMAP: Self = Self(*b"cmap");
    pub const LOCA: Self = Self(*b"loca");
    pub const GLYF: Self = Self(*b"glyf");

    /// Tables that must be present for outline rendering
    pub const REQUIRED: [Self; 7] = [
        Self::HEAD,
        Self::HHEA,
        Self::MAXP,
        Self::HMTX,
        Self::CMAP,
        Self::LOCA,
        Self::GLYF,
    ];
}

impl fmt::Debug for TableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableTag('{}')", self)
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("????"))
    }
}

/// sfnt version tags accepted for a single face
const SFNT_TRUETYPE: u32 = 0x0001_0000;
const SFNT_APPLE_TRUE: u32 = u32::from_be_bytes(*b"true");
const SFNT_OPENTYPE: u32 = u32::from_be_bytes(*b"OTTO");
const COLLECTION_TAG: u32 = u32::from_be_bytes(*b"ttcf");

/// An entry in the table directory
#[derive(Clone, Copy, Debug)]
pub struct TableRecord {
    pub tag: TableTag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// The table directory of one face
#[derive(Clone, Debug)]
pub struct TableDirectory {
    pub sfnt_version: u32,
    pub records: Vec<TableRecord>,
}

impl TableDirectory {
    /// Parses the directory of face `index`. Plain fonts only have face 0;
    /// collections (`ttcf`) are resolved through their offset table.
    pub fn parse(data: &[u8], index: u32) -> Result<Self> {
        let offset = face_offset(data, index)?;
        let mut r = FontReader::at(data, offset);

        let sfnt_version = r.read_u32()?;
        if !matches!(sfnt_version, SFNT_TRUETYPE | SFNT_APPLE_TRUE | SFNT_OPENTYPE) {
            return Err(TextError::FontParse(format!(
                "unrecognized sfnt version 0x{sfnt_version:08X}"
            )));
        }

        let num_tables = r.read_u16()?;
        r.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut records = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let record = TableRecord {
                tag: TableTag(r.read_tag()?),
                checksum: r.read_u32()?,
                offset: r.read_u32()?,
                length: r.read_u32()?,
            };
            let end = record.offset as u64 + record.length as u64;
            if end > data.len() as u64 {
                return Err(TextError::FontParse(format!(
                    "table '{}' extends past end of file ({} > {})",
                    record.tag,
                    end,
                    data.len()
                )));
            }
            records.push(record);
        }

        Ok(Self {
            sfnt_version,
            records,
        })
    }

    pub fn find(&self, tag: TableTag) -> Option<&TableRecord> {
        self.records.iter().find(|r| r.tag == tag)
    }

    /// Byte range of a table that must be present
    pub fn require(&self, tag: TableTag) -> Result<Range<usize>> {
        self.find(tag)
            .map(TableRecord::range)
            .ok_or_else(|| TextError::FontParse(format!("missing required table '{tag}'")))
    }
}

/// Offset of the table directory for face `index`.
fn face_offset(data: &[u8], index: u32) -> Result<usize> {
    let r = FontReader::new(data);
    if r.u32_at(0)? != COLLECTION_TAG {
        if index != 0 {
            return Err(TextError::FontParse(format!(
                "face index {index} requested from a single-face font"
            )));
        }
        return Ok(0);
    }

    let num_fonts = r.u32_at(8)?;
    if index >= num_fonts {
        return Err(TextError::FontParse(format!(
            "face index {index} out of range for collection of {num_fonts}"
        )));
    }
    Ok(r.u32_at(12 + index as usize * 4)? as usize)
}

/// `head` table fields used for rendering
#[derive(Clone, Copy, Debug)]
pub struct Head {
    pub units_per_em: u16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    /// `true` when `loca` stores 32-bit offsets
    pub long_loca: bool,
}

const HEAD_MAGIC: u32 = 0x5F0F_3CF5;

impl Head {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        r.skip(12)?; // version, fontRevision, checksumAdjustment
        let magic = r.read_u32()?;
        if magic != HEAD_MAGIC {
            return Err(TextError::FontParse(format!(
                "bad head magic 0x{magic:08X}"
            )));
        }
        r.skip(2)?; // flags
        let units_per_em = r.read_u16()?;
        if units_per_em == 0 {
            return Err(TextError::FontParse("units per em is zero".to_string()));
        }
        r.skip(16)?; // created, modified
        let x_min = r.read_i16()?;
        let y_min = r.read_i16()?;
        let x_max = r.read_i16()?;
        let y_max = r.read_i16()?;
        r.skip(6)?; // macStyle, lowestRecPPEM, fontDirectionHint
        let long_loca = match r.read_i16()? {
            0 => false,
            1 => true,
            other => {
                return Err(TextError::FontParse(format!(
                    "unknown indexToLocFormat {other}"
                )))
            }
        };

        Ok(Self {
            units_per_em,
            x_min,
            y_min,
            x_max,
            y_max,
            long_loca,
        })
    }
}

/// `hhea` table
#[derive(Clone, Copy, Debug)]
pub struct Hhea {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub num_h_metrics: u16,
}

impl Hhea {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        r.skip(4)?; // version
        let ascender = r.read_i16()?;
        let descender = r.read_i16()?;
        let line_gap = r.read_i16()?;
        let advance_width_max = r.read_u16()?;
        r.skip(22)?; // extents, caret, reserved, metricDataFormat
        let num_h_metrics = r.read_u16()?;

        Ok(Self {
            ascender,
            descender,
            line_gap,
            advance_width_max,
            num_h_metrics,
        })
    }
}

/// `maxp` table
#[derive(Clone, Copy, Debug)]
pub struct Maxp {
    pub num_glyphs: u16,
}

impl Maxp {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        r.skip(4)?; // version (0.5 or 1.0, the glyph count sits at the same place)
        Ok(Self {
            num_glyphs: r.read_u16()?,
        })
    }
}

/// Horizontal metrics for one glyph, in design units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HMetric {
    pub advance_width: u16,
    pub left_side_bearing: i16,
}

/// Looks up `glyph` in `hmtx`. Glyphs past `num_h_metrics` share the last
/// advance and read their bearing from the trailing array.
pub fn hmetric(
    hmtx: &[u8],
    num_h_metrics: u16,
    glyph: u16,
) -> std::result::Result<HMetric, ReadError> {
    let r = FontReader::new(hmtx);
    if num_h_metrics == 0 {
        return Ok(HMetric::default());
    }

    if glyph < num_h_metrics {
        let base = glyph as usize * 4;
        return Ok(HMetric {
            advance_width: r.u16_at(base)?,
            left_side_bearing: r.u16_at(base + 2)? as i16,
        });
    }

    let advance_width = r.u16_at((num_h_metrics as usize - 1) * 4)?;
    let lsb_offset = num_h_metrics as usize * 4 + (glyph - num_h_metrics) as usize * 2;
    Ok(HMetric {
        advance_width,
        left_side_bearing: r.u16_at(lsb_offset)? as i16,
    })
}

/// Byte range of `glyph` inside `glyf`, from the `loca` offsets.
/// An empty range means the glyph has no outline.
pub fn glyph_range(
    loca: &[u8],
    long_loca: bool,
    glyph: u16,
) -> std::result::Result<Range<usize>, ReadError> {
    let r = FontReader::new(loca);
    let glyph = glyph as usize;
    let (start, end) = if long_loca {
        (r.u32_at(glyph * 4)? as usize, r.u32_at(glyph * 4 + 4)? as usize)
    } else {
        (
            r.u16_at(glyph * 2)? as usize * 2,
            r.u16_at(glyph * 2 + 2)? as usize * 2,
        )
    };
    // Out-of-order offsets are treated as an empty glyph
    Ok(start..end.max(start))
}

/// The character map subtable selected for lookups
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CmapSubtable {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub format: u16,
    /// Offset of the subtable from the start of `cmap`
    pub offset: usize,
}

impl CmapSubtable {
    /// Picks the most complete Unicode subtable that has a supported format.
    pub fn select(cmap: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(cmap);
        r.skip(2)?; // version
        let num_tables = r.read_u16()?;

        let mut best: Option<(u8, Self)> = None;
        for _ in 0..num_tables {
            let platform_id = r.read_u16()?;
            let encoding_id = r.read_u16()?;
            let offset = r.read_u32()? as usize;
            let Ok(format) = FontReader::new(cmap).u16_at(offset) else {
                tracing::debug!(platform_id, encoding_id, offset, "skipping cmap record past end of table");
                continue;
            };

            let score = match (platform_id, encoding_id, format) {
                (3, 10, 12) | (0, _, 12) => 5,
                (3, 1, 4) | (0, _, 4) => 4,
                (3, 0, 4) => 3,
                (0 | 3, _, 6) => 2,
                (_, _, 0) => 1,
                _ => 0,
            };
            if score == 0 {
                continue;
            }
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((
                    score,
                    Self {
                        platform_id,
                        encoding_id,
                        format,
                        offset,
                    },
                ));
            }
        }

        let (_, subtable) = best.ok_or_else(|| {
            TextError::FontParse("no supported cmap subtable".to_string())
        })?;
        tracing::debug!(
            platform = subtable.platform_id,
            encoding = subtable.encoding_id,
            format = subtable.format,
            "selected cmap subtable"
        );
        Ok(subtable)
    }

    /// Maps a codepoint to a glyph index. Unmapped codepoints and malformed
    /// subtable data both yield 0 (`.notdef`).
    pub fn lookup(&self, cmap: &[u8], codepoint: u32) -> u16 {
        let found = self.lookup_raw(cmap, codepoint);
        // Symbol fonts place their repertoire in the private use area
        if found == 0 && self.platform_id == 3 && self.encoding_id == 0 && codepoint <= 0xFF {
            return self.lookup_raw(cmap, 0xF000 | codepoint);
        }
        found
    }

    fn lookup_raw(&self, cmap: &[u8], codepoint: u32) -> u16 {
        let result = match self.format {
            0 => lookup_format0(cmap, self.offset, codepoint),
            4 => lookup_format4(cmap, self.offset, codepoint),
            6 => lookup_format6(cmap, self.offset, codepoint),
            12 => lookup_format12(cmap, self.offset, codepoint),
            _ => Ok(0),
        };
        result.unwrap_or(0)
    }
}

type Lookup = std::result::Result<u16, ReadError>;

fn lookup_format0(cmap: &[u8], base: usize, codepoint: u32) -> Lookup {
    if codepoint > 0xFF {
        return Ok(0);
    }
    Ok(FontReader::at(cmap, base + 6 + codepoint as usize).read_u8()? as u16)
}

fn lookup_format4(cmap: &[u8], base: usize, codepoint: u32) -> Lookup {
    if codepoint > 0xFFFF {
        return Ok(0);
    }
    let c = codepoint as u16;
    let r = FontReader::new(cmap);
    let seg_count = (r.u16_at(base + 6)? / 2) as usize;
    let end_codes = base + 14;
    let start_codes = end_codes + seg_count * 2 + 2;
    let id_deltas = start_codes + seg_count * 2;
    let id_range_offsets = id_deltas + seg_count * 2;

    // First segment whose end code is >= c
    let (mut lo, mut hi) = (0usize, seg_count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if r.u16_at(end_codes + mid * 2)? < c {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo == seg_count {
        return Ok(0);
    }

    let seg = lo;
    let start = r.u16_at(start_codes + seg * 2)?;
    if c < start {
        return Ok(0);
    }
    let delta = r.u16_at(id_deltas + seg * 2)?;
    let range_offset_pos = id_range_offsets + seg * 2;
    let range_offset = r.u16_at(range_offset_pos)?;

    if range_offset == 0 {
        return Ok(c.wrapping_add(delta));
    }

    // idRangeOffset is relative to its own position in the table
    let glyph_pos = range_offset_pos + range_offset as usize + (c - start) as usize * 2;
    let glyph = r.u16_at(glyph_pos)?;
    if glyph == 0 {
        return Ok(0);
    }
    Ok(glyph.wrapping_add(delta))
}

fn lookup_format6(cmap: &[u8], base: usize, codepoint: u32) -> Lookup {
    let r = FontReader::new(cmap);
    let first = r.u16_at(base + 6)? as u32;
    let count = r.u16_at(base + 8)? as u32;
    if codepoint < first || codepoint >= first + count {
        return Ok(0);
    }
    r.u16_at(base + 10 + (codepoint - first) as usize * 2)
}

fn lookup_format12(cmap: &[u8], base: usize, codepoint: u32) -> Lookup {
    let r = FontReader::new(cmap);
    let num_groups = r.u32_at(base + 12)? as usize;
    let groups = base + 16;

    let (mut lo, mut hi) = (0usize, num_groups);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let group = groups + mid * 12;
        let start = r.u32_at(group)?;
        let end = r.u32_at(group + 4)?;
        if codepoint < start {
            hi = mid;
        } else if codepoint > end {
            lo = mid + 1;
        } else {
            let start_glyph = r.u32_at(group + 8)?;
            let glyph = start_glyph.saturating_add(codepoint - start);
            return Ok(u16::try_from(glyph).unwrap_or(0));
        }
    }
    Ok(0)
}

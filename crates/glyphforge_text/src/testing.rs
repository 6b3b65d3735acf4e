//! In-memory TrueType fonts for tests
//!
//! Builds a small but structurally complete font: a `.notdef` box, an empty
//! space, an "O" with a hole, an "I" bar, a "D" with quadratic curves, an "H"
//! made of two "I" components and one glyph whose data is corrupt.

use crate::font::Font;
use std::path::PathBuf;

pub const UNITS_PER_EM: u16 = 1000;
pub const ASCENDER: i16 = 800;
pub const DESCENDER: i16 = -200;

pub const GLYPH_NOTDEF: u16 = 0;
pub const GLYPH_SPACE: u16 = 1;
pub const GLYPH_O: u16 = 2;
pub const GLYPH_I: u16 = 3;
pub const GLYPH_D: u16 = 4;
pub const GLYPH_H: u16 = 5;
pub const GLYPH_CORRUPT: u16 = 6;
pub const NUM_GLYPHS: u16 = 7;

/// Mapped only through the format 12 subtable
pub const ASTRAL: char = '\u{1F600}';
/// Mapped to the corrupt glyph
pub const CORRUPT_CHAR: char = 'x';

pub const SPACE_ADVANCE: u16 = 250;

type Point = (i16, i16, bool);

pub enum GlyphSpec {
    Empty,
    Simple(Vec<Vec<Point>>),
    Composite(Vec<(u16, i16, i16)>),
    Corrupt,
}

pub struct GlyphEntry {
    pub id: u16,
    pub spec: GlyphSpec,
    pub advance: u16,
    pub lsb: i16,
}

/// Axis-aligned rectangle, clockwise in y-up design space
fn rect_cw(x0: i16, y0: i16, x1: i16, y1: i16) -> Vec<Point> {
    vec![(x0, y0, true), (x0, y1, true), (x1, y1, true), (x1, y0, true)]
}

/// Axis-aligned rectangle, counter-clockwise (a hole)
fn rect_ccw(x0: i16, y0: i16, x1: i16, y1: i16) -> Vec<Point> {
    vec![(x0, y0, true), (x1, y0, true), (x1, y1, true), (x0, y1, true)]
}

pub fn glyph_specs() -> Vec<GlyphEntry> {
    vec![
        GlyphEntry {
            id: GLYPH_NOTDEF,
            spec: GlyphSpec::Simple(vec![rect_cw(50, 0, 450, 700), rect_ccw(100, 50, 400, 650)]),
            advance: 500,
            lsb: 50,
        },
        GlyphEntry {
            id: GLYPH_SPACE,
            spec: GlyphSpec::Empty,
            advance: SPACE_ADVANCE,
            lsb: 0,
        },
        GlyphEntry {
            id: GLYPH_O,
            spec: GlyphSpec::Simple(vec![rect_cw(100, 0, 600, 700), rect_ccw(200, 100, 500, 600)]),
            advance: 700,
            lsb: 100,
        },
        GlyphEntry {
            id: GLYPH_I,
            spec: GlyphSpec::Simple(vec![rect_cw(100, 0, 200, 700)]),
            advance: 300,
            lsb: 100,
        },
        GlyphEntry {
            id: GLYPH_D,
            spec: GlyphSpec::Simple(vec![vec![
                (100, 0, true),
                (100, 700, true),
                (300, 700, true),
                (600, 700, false),
                (600, 350, true),
                (600, 0, false),
                (300, 0, true),
            ]]),
            advance: 650,
            lsb: 100,
        },
        GlyphEntry {
            id: GLYPH_H,
            spec: GlyphSpec::Composite(vec![(GLYPH_I, 0, 0), (GLYPH_I, 300, 0)]),
            advance: 600,
            lsb: 100,
        },
        GlyphEntry {
            id: GLYPH_CORRUPT,
            spec: GlyphSpec::Corrupt,
            advance: 400,
            lsb: 0,
        },
    ]
}

/// Characters mapped by both cmap subtables
pub fn bmp_mappings() -> Vec<(char, u16)> {
    vec![
        (' ', GLYPH_SPACE),
        ('D', GLYPH_D),
        ('H', GLYPH_H),
        ('I', GLYPH_I),
        ('O', GLYPH_O),
        (CORRUPT_CHAR, GLYPH_CORRUPT),
    ]
}

fn push16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Encodes a simple glyph with word-sized coordinate deltas.
pub fn encode_simple(contours: &[Vec<Point>]) -> Vec<u8> {
    let points: Vec<Point> = contours.iter().flatten().copied().collect();
    let (mut x_min, mut y_min, mut x_max, mut y_max) = (i16::MAX, i16::MAX, i16::MIN, i16::MIN);
    for &(x, y, _) in &points {
        x_min = x_min.min(x);
        y_min = y_min.min(y);
        x_max = x_max.max(x);
        y_max = y_max.max(y);
    }

    let mut out = Vec::new();
    push16(&mut out, contours.len() as u16);
    for v in [x_min, y_min, x_max, y_max] {
        push16(&mut out, v as u16);
    }
    let mut end = 0u16;
    for contour in contours {
        end += contour.len() as u16;
        push16(&mut out, end - 1);
    }
    push16(&mut out, 0); // instruction length
    for &(_, _, on) in &points {
        out.push(u8::from(on));
    }
    let (mut px, mut py) = (0i16, 0i16);
    for &(x, _, _) in &points {
        push16(&mut out, (x - px) as u16);
        px = x;
    }
    for &(_, y, _) in &points {
        push16(&mut out, (y - py) as u16);
        py = y;
    }
    out
}

/// Encodes a composite glyph of `(glyph, dx, dy)` components.
pub fn encode_composite(components: &[(u16, i16, i16)]) -> Vec<u8> {
    let mut out = Vec::new();
    push16(&mut out, (-1i16) as u16);
    out.extend_from_slice(&[0u8; 8]);
    for (i, &(glyph, dx, dy)) in components.iter().enumerate() {
        let mut flags = 0x0001 | 0x0002; // words, xy values
        if i + 1 < components.len() {
            flags |= 0x0020;
        }
        push16(&mut out, flags);
        push16(&mut out, glyph);
        push16(&mut out, dx as u16);
        push16(&mut out, dy as u16);
    }
    out
}

/// Two contours whose end point indices decrease
fn encode_corrupt() -> Vec<u8> {
    let mut out = Vec::new();
    push16(&mut out, 2);
    out.extend_from_slice(&[0u8; 8]);
    push16(&mut out, 5);
    push16(&mut out, 2);
    push16(&mut out, 0);
    out.extend_from_slice(&[1u8; 6]);
    out
}

pub fn encode_all() -> Vec<Vec<u8>> {
    glyph_specs()
        .into_iter()
        .map(|entry| match entry.spec {
            GlyphSpec::Empty => Vec::new(),
            GlyphSpec::Simple(contours) => encode_simple(&contours),
            GlyphSpec::Composite(components) => encode_composite(&components),
            GlyphSpec::Corrupt => encode_corrupt(),
        })
        .collect()
}

/// Concatenates glyph records into `glyf` and builds a long-format `loca`.
pub fn build_glyf_loca(glyphs: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for glyph in glyphs {
        push32(&mut loca, glyf.len() as u32);
        glyf.extend_from_slice(glyph);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
    }
    push32(&mut loca, glyf.len() as u32);
    (glyf, loca)
}

fn build_head() -> Vec<u8> {
    let mut out = Vec::new();
    push32(&mut out, 0x0001_0000);
    push32(&mut out, 0x0001_0000);
    push32(&mut out, 0);
    push32(&mut out, 0x5F0F_3CF5);
    push16(&mut out, 0);
    push16(&mut out, UNITS_PER_EM);
    out.extend_from_slice(&[0u8; 16]);
    for v in [0i16, DESCENDER, 700, ASCENDER] {
        push16(&mut out, v as u16);
    }
    push16(&mut out, 0); // macStyle
    push16(&mut out, 8); // lowestRecPPEM
    push16(&mut out, 2); // fontDirectionHint
    push16(&mut out, 1); // long loca
    push16(&mut out, 0);
    out
}

fn build_hhea(num_h_metrics: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push32(&mut out, 0x0001_0000);
    push16(&mut out, ASCENDER as u16);
    push16(&mut out, DESCENDER as u16);
    push16(&mut out, 0);
    push16(&mut out, 700);
    out.extend_from_slice(&[0u8; 22]);
    push16(&mut out, num_h_metrics);
    out
}

fn build_maxp() -> Vec<u8> {
    let mut out = Vec::new();
    push32(&mut out, 0x0000_5000);
    push16(&mut out, NUM_GLYPHS);
    out
}

fn build_hmtx(specs: &[GlyphEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in specs {
        push16(&mut out, entry.advance);
        push16(&mut out, entry.lsb as u16);
    }
    out
}

fn build_cmap() -> Vec<u8> {
    let mut bmp = bmp_mappings();
    bmp.sort_by_key(|(c, _)| *c);

    // Format 4: one segment per character plus the 0xFFFF terminator
    let seg_count = bmp.len() as u16 + 1;
    let mut f4 = Vec::new();
    push16(&mut f4, 4);
    push16(&mut f4, 0); // length, patched below
    push16(&mut f4, 0);
    push16(&mut f4, seg_count * 2);
    push16(&mut f4, 0);
    push16(&mut f4, 0);
    push16(&mut f4, 0);
    for &(c, _) in &bmp {
        push16(&mut f4, c as u16);
    }
    push16(&mut f4, 0xFFFF);
    push16(&mut f4, 0);
    for &(c, _) in &bmp {
        push16(&mut f4, c as u16);
    }
    push16(&mut f4, 0xFFFF);
    for &(c, glyph) in &bmp {
        push16(&mut f4, glyph.wrapping_sub(c as u16));
    }
    push16(&mut f4, 1);
    for _ in 0..seg_count {
        push16(&mut f4, 0);
    }
    let len = f4.len() as u16;
    f4[2..4].copy_from_slice(&len.to_be_bytes());

    // Format 12: the same characters plus one outside the BMP
    let mut groups = bmp.clone();
    groups.push((ASTRAL, GLYPH_I));
    let mut f12 = Vec::new();
    push16(&mut f12, 12);
    push16(&mut f12, 0);
    push32(&mut f12, 16 + groups.len() as u32 * 12);
    push32(&mut f12, 0);
    push32(&mut f12, groups.len() as u32);
    for &(c, glyph) in &groups {
        push32(&mut f12, c as u32);
        push32(&mut f12, c as u32);
        push32(&mut f12, glyph as u32);
    }

    let mut out = Vec::new();
    push16(&mut out, 0);
    push16(&mut out, 2);
    let f4_offset = 4 + 2 * 8;
    push16(&mut out, 3);
    push16(&mut out, 1);
    push32(&mut out, f4_offset);
    push16(&mut out, 3);
    push16(&mut out, 10);
    push32(&mut out, f4_offset + f4.len() as u32);
    out.extend(f4);
    out.extend(f12);
    out
}

/// Assembles tables into an sfnt file with a valid directory.
pub fn assemble(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let header_len = 12 + 16 * tables.len();
    let mut out = Vec::new();
    push32(&mut out, 0x0001_0000);
    push16(&mut out, tables.len() as u16);
    push16(&mut out, 0);
    push16(&mut out, 0);
    push16(&mut out, 0);

    let mut offset = header_len;
    let mut body = Vec::new();
    for (tag, data) in tables {
        out.extend_from_slice(tag);
        push32(&mut out, 0);
        push32(&mut out, offset as u32);
        push32(&mut out, data.len() as u32);
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = header_len + body.len();
    }
    out.extend(body);
    out
}

pub fn test_font_data() -> Vec<u8> {
    let specs = glyph_specs();
    let (glyf, loca) = build_glyf_loca(&encode_all());
    assemble(&[
        (*b"cmap", build_cmap()),
        (*b"glyf", glyf),
        (*b"head", build_head()),
        (*b"hhea", build_hhea(NUM_GLYPHS)),
        (*b"hmtx", build_hmtx(&specs)),
        (*b"loca", loca),
        (*b"maxp", build_maxp()),
    ])
}

/// Copies a single-face font, shifting every table offset by `shift` so it
/// can be embedded after a collection header.
pub fn relocate(font: &[u8], shift: u32) -> Vec<u8> {
    let mut out = font.to_vec();
    let num_tables = u16::from_be_bytes([font[4], font[5]]) as usize;
    for i in 0..num_tables {
        let at = 12 + i * 16 + 8;
        let offset = u32::from_be_bytes([out[at], out[at + 1], out[at + 2], out[at + 3]]);
        out[at..at + 4].copy_from_slice(&(offset + shift).to_be_bytes());
    }
    out
}

pub fn test_font() -> Font {
    Font::from_data(test_font_data()).expect("synthetic font parses")
}

/// Writes the synthetic font to a per-process temporary file.
pub fn write_temp_font(name: &str) -> PathBuf {
    let path = temp_path(&format!("{name}.ttf"));
    std::fs::write(&path, test_font_data()).expect("write temp font");
    path
}

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("glyphforge-{}-{}", std::process::id(), name))
}

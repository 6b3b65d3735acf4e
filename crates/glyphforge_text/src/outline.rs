//! Glyph outline decoding from the `glyf` table
//!
//! Simple glyphs are decoded into contours of on/off-curve points. Composite
//! glyphs are flattened by decoding each referenced component and applying
//! its transform, so callers always see a plain list of contours.

use crate::reader::{FontReader, ReadError};
use crate::tables::glyph_range;
use crate::{Result, TextError};

/// A point of a quadratic TrueType contour, in font design units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlinePoint {
    pub x: f32,
    pub y: f32,
    pub on_curve: bool,
}

impl OutlinePoint {
    pub fn on(x: f32, y: f32) -> Self {
        Self { x, y, on_curve: true }
    }

    pub fn off(x: f32, y: f32) -> Self {
        Self { x, y, on_curve: false }
    }
}

/// A closed contour
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contour {
    pub points: Vec<OutlinePoint>,
}

/// All contours of a glyph
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    pub contours: Vec<Contour>,
}

impl Outline {
    pub fn new(contours: Vec<Contour>) -> Self {
        Self { contours }
    }

    /// `true` for glyphs without any drawable contour, like the space
    pub fn is_empty(&self) -> bool {
        self.contours.iter().all(|c| c.points.len() < 2)
    }

    pub fn point_count(&self) -> usize {
        self.contours.iter().map(|c| c.points.len()).sum()
    }

    /// Control box `(x_min, y_min, x_max, y_max)` over every point
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let mut points = self.contours.iter().flat_map(|c| c.points.iter());
        let first = points.next()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(points.fold(init, |(x0, y0, x1, y1), p| {
            (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
        }))
    }
}

// Simple glyph flags
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

// Composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Composite nesting limit. Also stops self-referencing components.
const MAX_COMPONENT_DEPTH: u32 = 8;
/// Component references expanded for one glyph, counted across all levels
const MAX_COMPONENTS: u32 = 1024;
/// Points in one expanded outline; `maxp` stores composite point counts as u16
const MAX_OUTLINE_POINTS: usize = u16::MAX as usize;

/// 2x3 affine transform `(xx, yx, xy, yy, dx, dy)`
#[derive(Clone, Copy, Debug, PartialEq)]
struct Transform {
    xx: f32,
    yx: f32,
    xy: f32,
    yy: f32,
    dx: f32,
    dy: f32,
}

impl Transform {
    const IDENTITY: Self = Self {
        xx: 1.0,
        yx: 0.0,
        xy: 0.0,
        yy: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.xx * x + self.xy * y + self.dx,
            self.yx * x + self.yy * y + self.dy,
        )
    }

    /// `self` applied after `inner`
    fn then(&self, inner: &Transform) -> Transform {
        let (dx, dy) = self.apply(inner.dx, inner.dy);
        Transform {
            xx: self.xx * inner.xx + self.xy * inner.yx,
            yx: self.yx * inner.xx + self.yy * inner.yx,
            xy: self.xx * inner.xy + self.xy * inner.yy,
            yy: self.yx * inner.xy + self.yy * inner.yy,
            dx,
            dy,
        }
    }
}

/// Borrowed view of the tables needed to decode outlines
#[derive(Clone, Copy, Debug)]
pub struct GlyphSource<'a> {
    pub glyf: &'a [u8],
    pub loca: &'a [u8],
    pub long_loca: bool,
    pub num_glyphs: u16,
}

impl<'a> GlyphSource<'a> {
    /// Decodes the outline of `glyph`, expanding composites.
    pub fn outline(&self, glyph: u16) -> Result<Outline> {
        let mut outline = Outline::default();
        let mut components = 0;
        self.append(glyph, &Transform::IDENTITY, 0, &mut components, &mut outline)?;
        Ok(outline)
    }

    fn append(
        &self,
        glyph: u16,
        transform: &Transform,
        depth: u32,
        components: &mut u32,
        out: &mut Outline,
    ) -> Result<()> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(glyph_error(glyph, "composite nesting too deep"));
        }
        if glyph >= self.num_glyphs {
            return Err(glyph_error(glyph, "glyph index out of range"));
        }

        let range = glyph_range(self.loca, self.long_loca, glyph).map_err(|e| read_error(glyph, e))?;
        if range.is_empty() {
            return Ok(());
        }
        let data = self
            .glyf
            .get(range.clone())
            .ok_or_else(|| glyph_error(glyph, format!("glyf range {range:?} out of bounds")))?;

        let mut r = FontReader::new(data);
        let num_contours = r.read_i16().map_err(|e| read_error(glyph, e))?;
        r.skip(8).map_err(|e| read_error(glyph, e))?; // bounding box

        if num_contours >= 0 {
            let contours = parse_simple(&mut r, num_contours as u16).map_err(|e| match e {
                SimpleError::Read(e) => read_error(glyph, e),
                SimpleError::Invalid(reason) => glyph_error(glyph, reason),
            })?;
            let added: usize = contours.iter().map(|c| c.points.len()).sum();
            if out.point_count() + added > MAX_OUTLINE_POINTS {
                return Err(glyph_error(glyph, "composite expands to too many points"));
            }
            out.contours.extend(contours.into_iter().map(|mut contour| {
                for p in &mut contour.points {
                    (p.x, p.y) = transform.apply(p.x, p.y);
                }
                contour
            }));
            Ok(())
        } else {
            self.append_composite(glyph, &mut r, transform, depth, components, out)
        }
    }

    fn append_composite(
        &self,
        glyph: u16,
        r: &mut FontReader<'_>,
        transform: &Transform,
        depth: u32,
        components: &mut u32,
        out: &mut Outline,
    ) -> Result<()> {
        loop {
            *components += 1;
            if *components > MAX_COMPONENTS {
                return Err(glyph_error(glyph, "composite has too many components"));
            }
            let component = read_component(r).map_err(|e| read_error(glyph, e))?;
            if !component.xy_values {
                tracing::warn!(
                    glyph,
                    component = component.glyph,
                    "point-matched composite placement is not supported, using zero offset"
                );
            }
            let combined = transform.then(&component.transform);
            self.append(component.glyph, &combined, depth + 1, components, out)?;

            if component.flags & MORE_COMPONENTS == 0 {
                return Ok(());
            }
        }
    }
}

struct Component {
    flags: u16,
    glyph: u16,
    xy_values: bool,
    transform: Transform,
}

fn read_component(r: &mut FontReader<'_>) -> std::result::Result<Component, ReadError> {
    let flags = r.read_u16()?;
    let glyph = r.read_u16()?;
    let xy_values = flags & ARGS_ARE_XY_VALUES != 0;

    let (arg1, arg2) = match (flags & ARG_1_AND_2_ARE_WORDS != 0, xy_values) {
        (true, true) => (r.read_i16()? as f32, r.read_i16()? as f32),
        (true, false) => (r.read_u16()? as f32, r.read_u16()? as f32),
        (false, true) => (r.read_i8()? as f32, r.read_i8()? as f32),
        (false, false) => (r.read_u8()? as f32, r.read_u8()? as f32),
    };

    let mut transform = Transform::IDENTITY;
    if flags & WE_HAVE_A_SCALE != 0 {
        let scale = r.read_f2dot14()?;
        transform.xx = scale;
        transform.yy = scale;
    } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
        transform.xx = r.read_f2dot14()?;
        transform.yy = r.read_f2dot14()?;
    } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
        transform.xx = r.read_f2dot14()?;
        transform.yx = r.read_f2dot14()?;
        transform.xy = r.read_f2dot14()?;
        transform.yy = r.read_f2dot14()?;
    }
    if xy_values {
        transform.dx = arg1;
        transform.dy = arg2;
    }

    Ok(Component {
        flags,
        glyph,
        xy_values,
        transform,
    })
}

enum SimpleError {
    Read(ReadError),
    Invalid(String),
}

impl From<ReadError> for SimpleError {
    fn from(err: ReadError) -> Self {
        SimpleError::Read(err)
    }
}

fn parse_simple(
    r: &mut FontReader<'_>,
    num_contours: u16,
) -> std::result::Result<Vec<Contour>, SimpleError> {
    if num_contours == 0 {
        return Ok(Vec::new());
    }

    let mut end_points = Vec::with_capacity(num_contours as usize);
    let mut previous: Option<u16> = None;
    for _ in 0..num_contours {
        let end = r.read_u16()?;
        if previous.is_some_and(|p| end < p) {
            return Err(SimpleError::Invalid("contour end points decrease".to_string()));
        }
        previous = Some(end);
        end_points.push(end);
    }
    let num_points = previous.map_or(0, |last| last as usize + 1);

    let instruction_len = r.read_u16()?;
    r.skip(instruction_len as usize)?;

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = r.read_u8()?;
        flags.push(flag);
        if flag & REPEAT_FLAG != 0 {
            let count = r.read_u8()? as usize;
            if flags.len() + count > num_points {
                return Err(SimpleError::Invalid("flag repeat overruns point count".to_string()));
            }
            flags.extend(std::iter::repeat(flag).take(count));
        }
    }

    let xs = read_coordinates(r, &flags, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE)?;
    let ys = read_coordinates(r, &flags, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE)?;

    let mut contours = Vec::with_capacity(end_points.len());
    let mut start = 0usize;
    for end in end_points {
        let end = end as usize + 1;
        let points = (start..end)
            .map(|i| OutlinePoint {
                x: xs[i] as f32,
                y: ys[i] as f32,
                on_curve: flags[i] & ON_CURVE_POINT != 0,
            })
            .collect();
        contours.push(Contour { points });
        start = end;
    }
    Ok(contours)
}

/// Decodes one delta-encoded coordinate array.
fn read_coordinates(
    r: &mut FontReader<'_>,
    flags: &[u8],
    short_bit: u8,
    same_or_positive_bit: u8,
) -> std::result::Result<Vec<i32>, ReadError> {
    let mut value = 0i32;
    let mut coords = Vec::with_capacity(flags.len());
    for &flag in flags {
        let delta = if flag & short_bit != 0 {
            let magnitude = r.read_u8()? as i32;
            if flag & same_or_positive_bit != 0 {
                magnitude
            } else {
                -magnitude
            }
        } else if flag & same_or_positive_bit != 0 {
            0
        } else {
            r.read_i16()? as i32
        };
        value += delta;
        coords.push(value);
    }
    Ok(coords)
}

fn glyph_error(glyph: u16, reason: impl Into<String>) -> TextError {
    TextError::GlyphParse {
        glyph,
        reason: reason.into(),
    }
}

fn read_error(glyph: u16, err: ReadError) -> TextError {
    glyph_error(glyph, err.to_string())
}

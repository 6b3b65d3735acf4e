//! Text quad generation
//!
//! Turns a string into textured quads against a built atlas. The result is
//! plain vertex data for whatever renderer uploads it: two triangles per
//! glyph, positions in y-down screen pixels and texture coordinates
//! normalized to the atlas size.

use crate::atlas::{AtlasChar, GlyphAtlas};
use crate::charset;
use bitflags::bitflags;

bitflags! {
    /// Styling applied while generating quads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextEffects: u32 {
        /// Draw every glyph twice, the copy shifted right by one scaled pixel
        const BOLD = 1 << 0;
        /// Slant glyphs by moving their bottom edge left
        const ITALIC = 1 << 1;
        /// Add a bar under each character
        const UNDERLINE = 1 << 2;
        /// The atlas holds distance fields; only read by the renderer
        const SDF = 1 << 3;
    }
}

/// Horizontal shear of italic glyphs relative to their height
const ITALIC_SHEAR: f32 = 0.2;
/// Underline offset below the baseline relative to the pixel height
const UNDERLINE_OFFSET: f32 = 0.1;
const UNDERLINE_THICKNESS: f32 = 2.0;
const BOLD_OFFSET: f32 = 1.0;
/// Substituted for characters the atlas does not contain
const FALLBACK_CHAR: char = '?';

/// A vertex for textured glyph rendering
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlyphVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl GlyphVertex {
    fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y],
            tex_coords: [u, v],
        }
    }
}

/// Vertices for one call to `layout_text`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMesh {
    /// Glyph quads, six vertices each
    pub vertices: Vec<GlyphVertex>,
    /// Underline quads, six vertices each, texture coordinates zero
    pub underlines: Vec<GlyphVertex>,
    /// Pen advance of the whole string in pixels
    pub width: f32,
    pub effects: TextEffects,
}

impl TextMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() + self.underlines.len()
    }

    /// Glyph vertices as raw bytes for buffer upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn underline_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.underlines)
    }
}

/// Lays out `text` starting at pen position `(x, y)` on the baseline.
///
/// Text is decoded with the atlas' encoding. Characters missing from the
/// atlas fall back to `?`; if that is missing too the pen advances by half
/// the pixel height. Blank entries advance without emitting a glyph quad.
pub fn layout_text(
    atlas: &GlyphAtlas,
    text: impl AsRef<[u8]>,
    x: f32,
    y: f32,
    scale: f32,
    effects: TextEffects,
) -> TextMesh {
    let lookup = atlas.lookup();
    let (atlas_width, atlas_height) = (atlas.width(), atlas.height());
    let mut mesh = TextMesh {
        effects,
        ..TextMesh::default()
    };
    let mut pen_x = x;

    for c in charset::decode_text(text.as_ref(), atlas.encoding()) {
        let advance = match lookup.get_or(c, FALLBACK_CHAR) {
            Some(ch) => {
                if !ch.is_blank() {
                    push_glyph(&mut mesh.vertices, ch, pen_x, y, scale, effects, atlas_width, atlas_height);
                }
                ch.advance as f32 * scale
            }
            None => atlas.pixel_height() * 0.5 * scale,
        };

        if effects.contains(TextEffects::UNDERLINE) {
            let top = y + UNDERLINE_OFFSET * atlas.pixel_height() * scale;
            let bottom = top + UNDERLINE_THICKNESS * scale;
            push_quad(&mut mesh.underlines, [pen_x, top, pen_x + advance, bottom], [0.0; 4], 0.0);
        }
        pen_x += advance;
    }

    mesh.width = pen_x - x;
    mesh
}

#[allow(clippy::too_many_arguments)]
fn push_glyph(
    out: &mut Vec<GlyphVertex>,
    ch: &AtlasChar,
    pen_x: f32,
    baseline: f32,
    scale: f32,
    effects: TextEffects,
    atlas_width: u32,
    atlas_height: u32,
) {
    let left = pen_x + ch.xoff as f32 * scale;
    let top = baseline - ch.yoff as f32 * scale;
    let w = ch.width as f32 * scale;
    let h = ch.height as f32 * scale;
    let uv = ch.uv_bounds(atlas_width, atlas_height);
    let shear = if effects.contains(TextEffects::ITALIC) {
        ITALIC_SHEAR * h
    } else {
        0.0
    };

    push_quad(out, [left, top, left + w, top + h], uv, shear);
    if effects.contains(TextEffects::BOLD) {
        let offset = BOLD_OFFSET * scale;
        push_quad(out, [left + offset, top, left + w + offset, top + h], uv, shear);
    }
}

/// Two triangles covering `[x0, y0, x1, y1]` (y down). `shear` moves the
/// bottom edge left.
fn push_quad(out: &mut Vec<GlyphVertex>, rect: [f32; 4], uv: [f32; 4], shear: f32) {
    let [x0, y0, x1, y1] = rect;
    let [u0, v0, u1, v1] = uv;
    let top_left = GlyphVertex::new(x0, y0, u0, v0);
    let top_right = GlyphVertex::new(x1, y0, u1, v0);
    let bottom_left = GlyphVertex::new(x0 - shear, y1, u0, v1);
    let bottom_right = GlyphVertex::new(x1 - shear, y1, u1, v1);
    out.extend_from_slice(&[
        bottom_left,
        top_left,
        top_right,
        bottom_left,
        top_right,
        bottom_right,
    ]);
}

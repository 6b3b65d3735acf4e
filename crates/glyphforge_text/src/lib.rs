//! Glyph rasterization and atlas packing for glyphforge
//!
//! This crate provides:
//! - TrueType parsing (table directory, cmap, hmtx, loca, glyf)
//! - Glyph outline extraction, including composite glyphs
//! - Scanline rasterization with anti-aliased coverage
//! - Signed distance field conversion
//! - Row-packed glyph atlases with per-glyph metrics
//! - Text quad generation against a built atlas
//!
//! # Example
//!
//! ```no_run
//! use glyphforge_text::{CharEncoding, GlyphAtlas};
//!
//! let atlas = GlyphAtlas::create("font.ttf", 48.0, None, CharEncoding::Utf8, false)?;
//! atlas.save_png("atlas.png")?;
//! atlas.save_metadata("atlas.txt")?;
//!
//! if let Some(ch) = atlas.find_char('A') {
//!     println!("A is at ({}, {})", ch.x, ch.y);
//! }
//! # Ok::<(), glyphforge_text::TextError>(())
//! ```

pub mod reader;
pub mod tables;
pub mod outline;
pub mod font;
pub mod rasterizer;
pub mod sdf;
pub mod charset;
pub mod image_buffer;
pub mod atlas;
pub mod layout;

#[cfg(test)]
pub(crate) mod testing;

pub use atlas::{next_pow2, AtlasChar, AtlasConfig, AtlasMetadata, CharLookup, GlyphAtlas};
pub use charset::{decode_charset, decode_utf8, encode_utf8, CharEncoding};
pub use font::{Font, FontMetrics, GlyphId};
pub use image_buffer::Image;
pub use layout::{layout_text, GlyphVertex, TextEffects, TextMesh};
pub use outline::{Contour, Outline, OutlinePoint};
pub use rasterizer::{FillRule, GlyphBitmap, GlyphRasterizer};
pub use sdf::{distance_field, pad_bitmap};

use thiserror::Error;

/// Text rendering errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to load font: {0}")]
    FontLoad(String),

    #[error("Failed to parse font: {0}")]
    FontParse(String),

    #[error("Malformed glyph {glyph}: {reason}")]
    GlyphParse { glyph: u16, reason: String },

    #[error("Atlas could not fit all glyphs after {attempts} attempts (last size {width}x{height})")]
    AtlasFull {
        attempts: u32,
        width: u32,
        height: u32,
    },

    #[error("Charset contains no characters")]
    EmptyCharset,

    #[error("Invalid pixel height: {0}")]
    InvalidPixelHeight(f32),

    #[error("Glyph bitmap of {width}x{height} pixels exceeds the limit of {limit} pixels")]
    BitmapTooLarge { width: u64, height: u64, limit: u64 },

    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Invalid atlas metadata at line {line}: {reason}")]
    Metadata { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to write image: {0}")]
    Image(#[from] ::image::ImageError),
}

pub type Result<T> = std::result::Result<T, TextError>;

/// Allocates `len` copies of `value`, returning `TextError::Allocation`
/// instead of aborting when the memory is not available.
pub(crate) fn try_filled<T: Clone>(value: T, len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| TextError::Allocation {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    buf.resize(len, value);
    Ok(buf)
}

//! Owned RGB pixel buffer
//!
//! Row-major, origin top-left, three bytes per pixel. File export goes
//! through the `image` crate.

use crate::{try_filled, Result, TextError};
use image::error::{ParameterError, ParameterErrorKind};
use image::{ImageError, ImageFormat, RgbImage};
use std::path::Path;

/// An RGB image, zero-filled on creation
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    pub const CHANNELS: usize = 3;

    /// Allocates a black image. Fails with `TextError::Allocation` if the
    /// buffer cannot be allocated.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(Self::CHANNELS))
            .ok_or(TextError::Allocation { bytes: usize::MAX })?;
        Ok(Self {
            width,
            height,
            data: try_filled(0, len)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGB bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize * self.width as usize + x as usize) * Self::CHANNELS)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let i = self.index(x, y)?;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Sets a pixel. Writes outside the image are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if let Some(i) = self.index(x, y) {
            self.data[i..i + Self::CHANNELS].copy_from_slice(&rgb);
        }
    }

    /// Copies a single-channel bitmap to `(x, y)`, writing each value to all
    /// three channels. Parts falling outside the image are clipped.
    pub fn blit_gray(&mut self, src: &[u8], src_width: u32, src_height: u32, x: u32, y: u32) {
        if src_width == 0 {
            return;
        }
        let rows = src.chunks_exact(src_width as usize).take(src_height as usize);
        for (sy, row) in rows.enumerate() {
            for (sx, &value) in row.iter().enumerate() {
                self.set_pixel(x + sx as u32, y + sy as u32, [value; 3]);
            }
        }
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch))
                .into()
        })
    }

    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_as(path.as_ref(), ImageFormat::Png)
    }

    pub fn write_bmp(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_as(path.as_ref(), ImageFormat::Bmp)
    }

    /// Writes the image in the format named by the file extension
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path)?;
        self.write_as(path, format)
    }

    fn write_as(&self, path: &Path, format: ImageFormat) -> Result<()> {
        self.to_rgb_image()?.save_with_format(path, format)?;
        tracing::debug!(path = %path.display(), ?format, width = self.width, height = self.height, "wrote image");
        Ok(())
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

//! Big-endian byte reader
//!
//! All multi-byte values in an sfnt file are stored big-endian. `FontReader`
//! converts them to host order and bounds-checks every access, so a truncated
//! or corrupt table surfaces as a `ReadError` instead of a panic.

use thiserror::Error;

/// Attempted to read past the end of a table
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read of {len} bytes at offset {offset} is out of bounds (size {size})")]
pub struct ReadError {
    pub offset: usize,
    pub len: usize,
    pub size: usize,
}

/// Cursor over a byte slice
#[derive(Debug, Clone, Copy)]
pub struct FontReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FontReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reader positioned at `offset`. Positioning past the end is allowed;
    /// the first read reports the error.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, pos: offset }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.bytes(len).map(|_| ())
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self.pos.checked_add(len).ok_or(self.error(len))?;
        let slice = self.data.get(self.pos..end).ok_or(self.error(len))?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_tag(&mut self) -> Result<[u8; 4], ReadError> {
        let b = self.bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// 2.14 signed fixed point, used by composite glyph transforms.
    pub fn read_f2dot14(&mut self) -> Result<f32, ReadError> {
        Ok(self.read_i16()? as f32 / 16384.0)
    }

    /// Reads a `u16` at an absolute offset without moving the cursor.
    pub fn u16_at(&self, offset: usize) -> Result<u16, ReadError> {
        FontReader::at(self.data, offset).read_u16()
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, ReadError> {
        FontReader::at(self.data, offset).read_u32()
    }

    fn error(&self, len: usize) -> ReadError {
        ReadError {
            offset: self.pos,
            len,
            size: self.data.len(),
        }
    }
}

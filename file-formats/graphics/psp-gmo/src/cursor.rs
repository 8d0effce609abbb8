//! Bounds-checked little-endian reader over an in-memory buffer
//!
//! Every read checks the remaining length first and fails with
//! [`GmoError::TruncatedData`] instead of panicking or zero-filling.
//! Positions are absolute within the wrapped slice, so the current
//! position can be saved and restored for backtracking.

use crate::error::{GmoError, Result};

/// Sequential reader over a byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    /// Offset of `data[0]` within the enclosing buffer, for error reporting
    base: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Total length of the underlying slice
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying slice is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current position relative to the start of this cursor
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Move to an absolute position; `offset == len()` is allowed
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(GmoError::InvalidOffset {
                offset: self.base + offset,
                len: self.base + self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Advance by `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Advance to the next multiple of `align`
    pub fn align_to(&mut self, align: usize) -> Result<()> {
        let padding = (align - self.pos % align) % align;
        self.skip(padding)
    }

    /// A cursor over `len` bytes starting at `offset`, with positions relative to `offset`
    pub fn sub_cursor(&self, offset: usize, len: usize) -> Result<ByteCursor<'a>> {
        let end = offset.checked_add(len).ok_or(GmoError::InvalidOffset {
            offset: self.base + offset,
            len: self.base + self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(GmoError::TruncatedData {
                offset: self.base + offset,
                needed: len,
                available: self.data.len().saturating_sub(offset),
            });
        }
        Ok(ByteCursor {
            data: &self.data[offset..end],
            pos: 0,
            base: self.base + offset,
        })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(GmoError::TruncatedData {
                offset: self.base + self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Read `N` consecutive floats
    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0f32; N];
        for value in &mut out {
            *value = self.read_f32()?;
        }
        Ok(out)
    }

    /// Borrow the next `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a fixed-width, NUL-padded name field
    pub fn read_fixed_str(&mut self, n: usize) -> Result<String> {
        let raw = self.take(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

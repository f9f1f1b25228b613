//! Binary reader for parsing little-endian chunk data from byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! binary data from a byte slice without copying. Every read is bounded by
//! the bytes actually present, so a corrupt length field fails fast instead
//! of triggering a large allocation.

use glam::{Mat4, Vec2, Vec3, Vec4};
use zerocopy::FromBytes;

use crate::{Error, Result};

/// A binary reader over a byte slice.
///
/// Readers created with [`BinaryReader::sub_reader`] remember where their
/// slice started in the enclosing stream, so [`BinaryReader::offset`] and the
/// offsets carried by [`Error::UnexpectedEof`] are always absolute.
///
/// # Example
///
/// ```
/// use rmdkit_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_u32().unwrap(), 0x08070605);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
    base: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            base: 0,
        }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position,
            base: 0,
        }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the absolute offset of the cursor in the outermost stream.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.base + self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position within this reader's slice.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Move the cursor back by a number of bytes.
    #[inline]
    pub fn rewind(&mut self, count: usize) {
        self.position = self.position.saturating_sub(count);
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                offset: self.offset(),
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Split off the next `count` bytes as an independent reader and
    /// advance past them.
    pub fn sub_reader(&mut self, count: usize) -> Result<BinaryReader<'a>> {
        let base = self.offset();
        let bytes = self.read_bytes(count)?;
        Ok(BinaryReader {
            data: bytes,
            position: 0,
            base,
        })
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian f32.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 32-bit boolean (non-zero = true).
    #[inline]
    pub fn read_bool32(&mut self) -> Result<bool> {
        self.read_u32().map(|v| v != 0)
    }

    /// Read two consecutive f32 values.
    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    /// Read three consecutive f32 values.
    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Read four consecutive f32 values.
    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Read a reduced 4x3 transform: right, up, at and position rows.
    ///
    /// The missing column is reconstructed as `[0, 0, 0, 1]`.
    pub fn read_matrix4x3(&mut self) -> Result<Mat4> {
        let right = self.read_vec3()?;
        let up = self.read_vec3()?;
        let at = self.read_vec3()?;
        let pos = self.read_vec3()?;
        Ok(Mat4::from_cols(
            right.extend(0.0),
            up.extend(0.0),
            at.extend(0.0),
            pos.extend(1.0),
        ))
    }

    /// Read a full 4x4 matrix stored row by row.
    pub fn read_matrix4x4(&mut self) -> Result<Mat4> {
        Ok(Mat4::from_cols(
            self.read_vec4()?,
            self.read_vec4()?,
            self.read_vec4()?,
            self.read_vec4()?,
        ))
    }

    /// Read a RenderWare string occupying exactly `length` bytes.
    ///
    /// Every byte is taken as a character and embedded NUL bytes are
    /// stripped rather than terminating the string.
    pub fn read_rw_string(&mut self, length: usize) -> Result<String> {
        let bytes = self.read_bytes(length)?;
        Ok(bytes
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect())
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let offset = self.offset();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Peek at a value without advancing.
    #[inline]
    pub fn peek_u32(&self) -> Result<u32> {
        let bytes = self.peek_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, // u32: 0xFFFFFFFF
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u32().unwrap(), 0xFFFFFFFF);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_rw_string_strips_embedded_nuls() {
        let data = b"ab\0c\0\0\0\0";
        let mut reader = BinaryReader::new(data);

        assert_eq!(reader.read_rw_string(8).unwrap(), "abc");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.peek_u32().unwrap(), 0x04030201);
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_eof_error_carries_offset() {
        let data = [0u8; 6];
        let mut reader = BinaryReader::new(&data);
        reader.read_u32().unwrap();

        match reader.read_u32() {
            Err(Error::UnexpectedEof {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 4);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected EOF error, got {:?}", other),
        }
    }

    #[test]
    fn test_sub_reader_offsets_are_absolute() {
        let data = [0u8; 16];
        let mut reader = BinaryReader::new(&data);
        reader.read_u32().unwrap();

        let mut sub = reader.sub_reader(8).unwrap();
        assert_eq!(reader.position(), 12);
        assert_eq!(sub.offset(), 4);
        sub.read_u32().unwrap();
        assert_eq!(sub.offset(), 8);
        assert_eq!(sub.remaining(), 4);
    }

    #[test]
    fn test_read_matrix4x3_implicit_column() {
        let mut data = Vec::new();
        for v in [1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 5.0, 6.0, 7.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut reader = BinaryReader::new(&data);
        let m = reader.read_matrix4x3().unwrap();

        assert_eq!(m.w_axis, Vec4::new(5.0, 6.0, 7.0, 1.0));
        assert_eq!(m.x_axis.w, 0.0);
        assert_eq!(m, Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0)));
    }
}

//! Binary writer for emitting little-endian chunk data.
//!
//! [`BinaryWriter`] mirrors [`crate::BinaryReader`]. It is backed by a
//! seekable in-memory cursor so that fields whose value is only known after
//! the following bytes are written (chunk sizes) can be patched in place.

use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Mat4, Vec2, Vec3, Vec4};
use zerocopy::{Immutable, IntoBytes};

use crate::{Error, Result};

/// Number of zero bytes that follow the NUL terminator of a string of
/// `len` bytes so that the encoded string ends on a 4-byte boundary.
#[inline]
pub const fn rw_string_padding(len: usize) -> usize {
    (4 - ((len + 1) % 4)) % 4
}

/// A little-endian writer over a growable byte buffer.
///
/// # Example
///
/// ```
/// use rmdkit_common::BinaryWriter;
///
/// let mut writer = BinaryWriter::new();
/// let offset = writer.position();
/// writer.write_u32(0).unwrap();
/// writer.write_u32(7).unwrap();
/// writer.patch_u32(offset, 4).unwrap();
///
/// assert_eq!(writer.into_inner(), [4, 0, 0, 0, 7, 0, 0, 0]);
/// ```
#[derive(Debug, Default)]
pub struct BinaryWriter {
    cursor: Cursor<Vec<u8>>,
}

impl BinaryWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with a preallocated buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cursor: Cursor::new(Vec::with_capacity(capacity)),
        }
    }

    /// Get the current write position.
    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Get the bytes written so far.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// Consume the writer and return the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.cursor.write_u8(value)?)
    }

    /// Write a little-endian u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.cursor.write_u16::<LittleEndian>(value)?)
    }

    /// Write a little-endian u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.cursor.write_u32::<LittleEndian>(value)?)
    }

    /// Write a little-endian i32.
    #[inline]
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.cursor.write_i32::<LittleEndian>(value)?)
    }

    /// Write a little-endian f32.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        Ok(self.cursor.write_f32::<LittleEndian>(value)?)
    }

    /// Write a 32-bit boolean.
    #[inline]
    pub fn write_bool32(&mut self, value: bool) -> Result<()> {
        self.write_u32(u32::from(value))
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.cursor.write_all(bytes)?)
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.write_u8(0)?;
        }
        Ok(())
    }

    pub fn write_vec2(&mut self, value: Vec2) -> Result<()> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)
    }

    pub fn write_vec3(&mut self, value: Vec3) -> Result<()> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)?;
        self.write_f32(value.z)
    }

    pub fn write_vec4(&mut self, value: Vec4) -> Result<()> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)?;
        self.write_f32(value.z)?;
        self.write_f32(value.w)
    }

    /// Write a reduced 4x3 transform, dropping the implicit column.
    pub fn write_matrix4x3(&mut self, value: &Mat4) -> Result<()> {
        self.write_vec3(value.x_axis.truncate())?;
        self.write_vec3(value.y_axis.truncate())?;
        self.write_vec3(value.z_axis.truncate())?;
        self.write_vec3(value.w_axis.truncate())
    }

    /// Write a full 4x4 matrix row by row.
    pub fn write_matrix4x4(&mut self, value: &Mat4) -> Result<()> {
        self.write_vec4(value.x_axis)?;
        self.write_vec4(value.y_axis)?;
        self.write_vec4(value.z_axis)?;
        self.write_vec4(value.w_axis)
    }

    /// Write a RenderWare string: the characters, one NUL terminator, then
    /// zero padding up to the next 4-byte boundary.
    ///
    /// Returns the number of bytes written.
    pub fn write_rw_string(&mut self, value: &str) -> Result<usize> {
        let mut bytes = Vec::with_capacity(value.len() + 4);
        for c in value.chars() {
            match u8::try_from(u32::from(c)) {
                Ok(b) if b != 0 => bytes.push(b),
                _ => return Err(Error::InvalidString(value.to_string())),
            }
        }

        let padding = rw_string_padding(bytes.len());
        let total = bytes.len() + 1 + padding;
        self.write_bytes(&bytes)?;
        self.write_zeros(1 + padding)?;
        Ok(total)
    }

    /// Write a struct using zerocopy.
    pub fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Overwrite a u32 at an earlier offset, then return to the end.
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let end = self.cursor.position();
        self.cursor.seek(SeekFrom::Start(offset as u64))?;
        self.cursor.write_u32::<LittleEndian>(value)?;
        self.cursor.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryReader;

    #[test]
    fn test_string_padding_law() {
        for s in ["", "a", "ab", "abc", "abcd", "body_tex01", "a longer texture name"] {
            let mut writer = BinaryWriter::new();
            let written = writer.write_rw_string(s).unwrap();
            let bytes = writer.into_inner();

            assert_eq!(written, bytes.len());
            assert_eq!(bytes.len() % 4, 0, "{:?} not aligned", s);
            assert_eq!(bytes.len(), s.len() + 1 + rw_string_padding(s.len()));

            let mut reader = BinaryReader::new(&bytes);
            assert_eq!(reader.read_rw_string(bytes.len()).unwrap(), s);
        }
    }

    #[test]
    fn test_padding_values() {
        assert_eq!(rw_string_padding(0), 3);
        assert_eq!(rw_string_padding(3), 0);
        assert_eq!(rw_string_padding(4), 3);
        assert_eq!(rw_string_padding(7), 0);
    }

    #[test]
    fn test_rejects_unencodable_strings() {
        let mut writer = BinaryWriter::new();
        assert!(matches!(
            writer.write_rw_string("tex\u{3042}"),
            Err(Error::InvalidString(_))
        ));
        assert!(matches!(
            writer.write_rw_string("a\0b"),
            Err(Error::InvalidString(_))
        ));
    }

    #[test]
    fn test_patch_returns_to_end() {
        let mut writer = BinaryWriter::new();
        writer.write_u32(0xDEAD).unwrap();
        writer.write_u16(1).unwrap();
        writer.patch_u32(0, 0xBEEF).unwrap();
        writer.write_u8(9).unwrap();

        assert_eq!(writer.position(), 7);
        assert_eq!(writer.into_inner(), [0xEF, 0xBE, 0, 0, 1, 0, 9]);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let m = Mat4::from_cols(
            Vec4::new(1.0, 2.0, 3.0, 0.0),
            Vec4::new(4.0, 5.0, 6.0, 0.0),
            Vec4::new(7.0, 8.0, 9.0, 0.0),
            Vec4::new(10.0, 11.0, 12.0, 1.0),
        );
        let mut writer = BinaryWriter::new();
        writer.write_matrix4x3(&m).unwrap();
        writer.write_matrix4x4(&m).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 48 + 64);

        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_matrix4x3().unwrap(), m);
        assert_eq!(reader.read_matrix4x4().unwrap(), m);
    }
}

//! Frame list struct.
//!
//! Frames are stored as a flat array. Each record is a reduced 4x3 local
//! transform followed by the index of the parent frame (`-1` for a root).

use glam::{Mat4, Vec3};
use rmdkit_common::{BinaryReader, BinaryWriter};

use super::bounded_capacity;
use crate::Result;

/// Encoded size of one frame record.
pub const FRAME_SIZE: usize = 56;

/// A single frame (bone) of a frame list.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// Local transform relative to the parent frame.
    pub transform: Mat4,
    /// Flat index of the parent frame, `-1` for roots.
    pub parent_index: i32,
    /// Matrix creation flags.
    pub flags: u32,
}

impl Default for Frame {
    fn default() -> Self {
        Self::root(Mat4::IDENTITY)
    }
}

impl Frame {
    /// A root frame with the given local transform.
    pub fn root(transform: Mat4) -> Self {
        Self {
            transform,
            parent_index: -1,
            flags: 0,
        }
    }

    /// A frame parented to the frame at `parent`.
    pub fn child_of(parent: usize, transform: Mat4) -> Self {
        Self {
            transform,
            parent_index: parent as i32,
            flags: 0,
        }
    }

    /// Flat index of the parent frame, if any.
    pub fn parent(&self) -> Option<usize> {
        usize::try_from(self.parent_index).ok()
    }

    /// Local translation.
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Struct of a frame list.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameListStruct {
    pub frames: Vec<Frame>,
}

impl FrameListStruct {
    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let mut frames = Vec::with_capacity(bounded_capacity(count, FRAME_SIZE, reader));
        for _ in 0..count {
            let transform = reader.read_matrix4x3()?;
            let parent_index = reader.read_i32()?;
            let flags = reader.read_u32()?;
            frames.push(Frame {
                transform,
                parent_index,
                flags,
            });
        }
        Ok(Self { frames })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.frames.len() as u32)?;
        for frame in &self.frames {
            writer.write_matrix4x3(&frame.transform)?;
            writer.write_i32(frame.parent_index)?;
            writer.write_u32(frame.flags)?;
        }
        Ok(())
    }
}

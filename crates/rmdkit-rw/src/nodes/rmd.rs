//! RMD extension chunks with a known layout.

use glam::Mat4;
use rmdkit_common::{BinaryReader, BinaryWriter};

use super::bounded_capacity;
use crate::Result;

/// Encoded size of one node link: two ids and a 4x3 matrix.
const NODE_LINK_SIZE: usize = 8 + 48;

/// Attaches one frame to another frame, possibly of a different clump.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeLink {
    pub child_frame_id: u32,
    pub parent_frame_id: u32,
    /// Pivot transform of the child relative to the parent.
    pub transform: Mat4,
}

/// Body of an RMD node-link list.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeLinkList {
    pub links: Vec<NodeLink>,
}

impl NodeLinkList {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let mut links = Vec::with_capacity(bounded_capacity(count, NODE_LINK_SIZE, reader));
        for _ in 0..count {
            links.push(NodeLink {
                child_frame_id: reader.read_u32()?,
                parent_frame_id: reader.read_u32()?,
                transform: reader.read_matrix4x3()?,
            });
        }
        Ok(Self { links })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.links.len() as u32)?;
        for link in &self.links {
            writer.write_u32(link.child_frame_id)?;
            writer.write_u32(link.parent_frame_id)?;
            writer.write_matrix4x3(&link.transform)?;
        }
        Ok(())
    }
}

/// Body of the RMD animation-count marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationCount {
    pub count: u16,
    pub reserved: u16,
}

impl AnimationCount {
    pub fn new(count: u16) -> Self {
        Self { count, reserved: 0 }
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            count: reader.read_u16()?,
            reserved: reader.read_u16()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u16(self.count)?;
        writer.write_u16(self.reserved)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_node_link_list_roundtrip() {
        let list = NodeLinkList {
            links: vec![
                NodeLink {
                    child_frame_id: 12,
                    parent_frame_id: 3,
                    transform: Mat4::from_translation(Vec3::new(0.0, 1.5, 0.0)),
                },
                NodeLink {
                    child_frame_id: 13,
                    parent_frame_id: 3,
                    transform: Mat4::IDENTITY,
                },
            ],
        };

        let mut writer = BinaryWriter::new();
        list.write(&mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 4 + 2 * NODE_LINK_SIZE);
        assert_eq!(NodeLinkList::read(&mut BinaryReader::new(&bytes)).unwrap(), list);
    }

    #[test]
    fn test_node_link_list_huge_count_fails_fast() {
        let bytes = [0xFF, 0xFF, 0xFF, 0x7F, 0, 0, 0, 0];
        assert!(NodeLinkList::read(&mut BinaryReader::new(&bytes)).is_err());
    }

    #[test]
    fn test_animation_count_layout() {
        let mut writer = BinaryWriter::new();
        AnimationCount::new(3).write(&mut writer).unwrap();
        assert_eq!(writer.into_inner(), vec![3, 0, 0, 0]);
    }
}

//! Extension plugins: H-Anim hierarchy, skin and sky mipmap.

use glam::Mat4;
use rmdkit_common::{BinaryReader, BinaryWriter};

use super::{bounded_capacity, SchemaContext};
use crate::{ChunkId, Error, Result};

/// Version field written by the H-Anim plugin.
pub const HANIM_VERSION: u32 = 0x100;

/// One entry of an animation hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HAnimNode {
    /// Name id of the frame this entry drives.
    pub name_id: u32,
    /// Hierarchy index used by animations and skin weights.
    pub index: u32,
    /// Push/pop flags describing the tree shape.
    pub flags: u32,
}

/// H-Anim plugin attached to a frame's extension.
///
/// Every animated frame carries one with its `name_id`; the root frame's
/// plugin additionally lists the whole hierarchy in `nodes`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HAnimPlugin {
    pub version: u32,
    pub name_id: u32,
    pub flags: u32,
    pub key_frame_size: u32,
    pub nodes: Vec<HAnimNode>,
}

impl Default for HAnimPlugin {
    fn default() -> Self {
        Self {
            version: HANIM_VERSION,
            name_id: 0,
            flags: 0,
            key_frame_size: 36,
            nodes: Vec::new(),
        }
    }
}

impl HAnimPlugin {
    /// A plugin that only tags a frame with a name id.
    pub fn tag(name_id: u32) -> Self {
        Self {
            name_id,
            ..Self::default()
        }
    }

    /// Whether this plugin carries the hierarchy table.
    pub fn is_root(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let version = reader.read_u32()?;
        let name_id = reader.read_u32()?;
        let node_count = reader.read_u32()? as usize;

        let mut plugin = Self {
            version,
            name_id,
            flags: 0,
            key_frame_size: 0,
            nodes: Vec::new(),
        };

        if node_count > 0 {
            plugin.flags = reader.read_u32()?;
            plugin.key_frame_size = reader.read_u32()?;
            plugin.nodes.reserve(bounded_capacity(node_count, 12, reader));
            for _ in 0..node_count {
                plugin.nodes.push(HAnimNode {
                    name_id: reader.read_u32()?,
                    index: reader.read_u32()?,
                    flags: reader.read_u32()?,
                });
            }
        }

        Ok(plugin)
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.version)?;
        writer.write_u32(self.name_id)?;
        writer.write_u32(self.nodes.len() as u32)?;
        if !self.nodes.is_empty() {
            writer.write_u32(self.flags)?;
            writer.write_u32(self.key_frame_size)?;
            for node in &self.nodes {
                writer.write_u32(node.name_id)?;
                writer.write_u32(node.index)?;
                writer.write_u32(node.flags)?;
            }
        }
        Ok(())
    }
}

/// Redistribute the shortfall of a vertex's weights across its used slots
/// so that they sum to one.
///
/// Vertices without any non-zero weight are left untouched.
pub fn normalize_weights(weights: &mut [f32; 4]) {
    let used = weights.iter().filter(|&&w| w != 0.0).count();
    if used == 0 {
        return;
    }

    let sum: f32 = weights.iter().sum();
    if 1.0 - sum <= f32::EPSILON {
        return;
    }

    let remainder = (1.0 - sum) / used as f32;
    for w in weights.iter_mut().filter(|w| **w != 0.0) {
        *w += remainder;
    }
}

/// Skin plugin attached to a geometry's extension.
///
/// Bone indices are hierarchy indices, not flat frame indices; see
/// [`FrameHierarchy::skin_bone_frames`](crate::FrameHierarchy::skin_bone_frames).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkinPlugin {
    pub bone_count: u8,
    pub max_weights_per_vertex: u8,
    pub reserved: u8,
    pub used_bones: Vec<u8>,
    /// Up to four hierarchy indices per vertex.
    pub bone_indices: Vec<[u8; 4]>,
    /// Weight of each of the four influences per vertex.
    pub weights: Vec<[f32; 4]>,
    pub inverse_bind_matrices: Vec<Mat4>,
    /// Bone limit and split tables, kept verbatim.
    pub split_data: Vec<u8>,
}

impl SkinPlugin {
    /// Number of vertices covered by this skin.
    pub fn vertex_count(&self) -> usize {
        self.weights.len()
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>, ctx: &SchemaContext) -> Result<Self> {
        let vertices = ctx
            .geometry
            .map(|g| g.vertex_count as usize)
            .ok_or_else(|| Error::InvalidNode {
                tag: ChunkId::SKIN,
                reason: "skin outside of a geometry".to_string(),
            })?;

        let bone_count = reader.read_u8()?;
        let used_bone_count = reader.read_u8()? as usize;
        let max_weights_per_vertex = reader.read_u8()?;
        let reserved = reader.read_u8()?;
        let used_bones = reader.read_bytes(used_bone_count)?.to_vec();

        let mut bone_indices = Vec::with_capacity(bounded_capacity(vertices, 4, reader));
        for _ in 0..vertices {
            let b = reader.read_bytes(4)?;
            bone_indices.push([b[0], b[1], b[2], b[3]]);
        }

        let mut weights = Vec::with_capacity(bounded_capacity(vertices, 16, reader));
        for _ in 0..vertices {
            weights.push([
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ]);
        }

        let mut inverse_bind_matrices = Vec::with_capacity(bone_count as usize);
        for _ in 0..bone_count {
            inverse_bind_matrices.push(reader.read_matrix4x4()?);
        }

        let split_data = reader.read_bytes(reader.remaining())?.to_vec();

        Ok(Self {
            bone_count,
            max_weights_per_vertex,
            reserved,
            used_bones,
            bone_indices,
            weights,
            inverse_bind_matrices,
            split_data,
        })
    }

    /// Check that per-vertex and per-bone arrays agree.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidNode {
            tag: ChunkId::SKIN,
            reason,
        };
        if self.bone_indices.len() != self.weights.len() {
            return Err(invalid(format!(
                "{} bone index sets for {} weight sets",
                self.bone_indices.len(),
                self.weights.len()
            )));
        }
        if self.inverse_bind_matrices.len() != self.bone_count as usize {
            return Err(invalid(format!(
                "{} inverse bind matrices for {} bones",
                self.inverse_bind_matrices.len(),
                self.bone_count
            )));
        }
        if self.used_bones.len() > u8::MAX as usize {
            return Err(invalid(format!("{} used bones", self.used_bones.len())));
        }
        Ok(())
    }

    /// Write the plugin; weights are normalized on the way out.
    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        self.validate()?;

        writer.write_u8(self.bone_count)?;
        writer.write_u8(self.used_bones.len() as u8)?;
        writer.write_u8(self.max_weights_per_vertex)?;
        writer.write_u8(self.reserved)?;
        writer.write_bytes(&self.used_bones)?;
        for indices in &self.bone_indices {
            writer.write_bytes(indices)?;
        }
        for weights in &self.weights {
            let mut normalized = *weights;
            normalize_weights(&mut normalized);
            for w in normalized {
                writer.write_f32(w)?;
            }
        }
        for matrix in &self.inverse_bind_matrices {
            writer.write_matrix4x4(matrix)?;
        }
        writer.write_bytes(&self.split_data)?;
        Ok(())
    }
}

/// Sky mipmap plugin of a texture native: the mipmap K value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkyMipmap {
    pub k_value: u32,
}

impl Default for SkyMipmap {
    fn default() -> Self {
        Self { k_value: 0xFC0 }
    }
}

impl SkyMipmap {
    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            k_value: reader.read_u32()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.k_value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::RW_VERSION;
    use crate::nodes::GeometryInfo;

    #[test]
    fn test_normalize_weights_sums_to_one() {
        let cases = [
            [0.5, 0.3, 0.0, 0.0],
            [0.1, 0.1, 0.1, 0.1],
            [0.7, 0.0, 0.0, 0.0],
            [0.33, 0.33, 0.33, 0.0],
        ];
        for mut weights in cases {
            normalize_weights(&mut weights);
            let sum: f32 = weights.iter().sum();
            assert!((sum - 1.0).abs() <= 1e-6, "{:?} sums to {}", weights, sum);
        }
    }

    #[test]
    fn test_normalize_weights_only_touches_used_slots() {
        let mut weights = [0.5, 0.0, 0.3, 0.0];
        normalize_weights(&mut weights);
        assert_eq!(weights[1], 0.0);
        assert_eq!(weights[3], 0.0);
        assert!((weights[0] - 0.6).abs() < 1e-6);
        assert!((weights[2] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_weights_degenerate_vertex() {
        let mut weights = [0.0; 4];
        normalize_weights(&mut weights);
        assert_eq!(weights, [0.0; 4]);
    }

    #[test]
    fn test_hanim_tag_has_no_table() {
        let plugin = HAnimPlugin::tag(7);
        let mut writer = BinaryWriter::new();
        plugin.write(&mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 12);

        let parsed = HAnimPlugin::read(&mut BinaryReader::new(&bytes)).unwrap();
        assert_eq!(parsed.name_id, 7);
        assert!(!parsed.is_root());
    }

    #[test]
    fn test_hanim_root_roundtrip() {
        let plugin = HAnimPlugin {
            name_id: 1,
            nodes: vec![
                HAnimNode {
                    name_id: 1,
                    index: 0,
                    flags: 0,
                },
                HAnimNode {
                    name_id: 2,
                    index: 1,
                    flags: 1,
                },
            ],
            ..HAnimPlugin::default()
        };
        let mut writer = BinaryWriter::new();
        plugin.write(&mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 20 + 24);
        assert_eq!(HAnimPlugin::read(&mut BinaryReader::new(&bytes)).unwrap(), plugin);
    }

    #[test]
    fn test_skin_write_normalizes_weights() {
        let skin = SkinPlugin {
            bone_count: 1,
            max_weights_per_vertex: 2,
            used_bones: vec![0],
            bone_indices: vec![[0, 1, 0, 0], [0, 0, 0, 0]],
            weights: vec![[0.6, 0.2, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
            ..SkinPlugin::default()
        };
        let mut writer = BinaryWriter::new();
        skin.write(&mut writer).unwrap();
        let bytes = writer.into_inner();

        let ctx = SchemaContext::new(RW_VERSION).with_geometry(Some(GeometryInfo {
            vertex_count: 2,
            native: false,
        }));
        let parsed = SkinPlugin::read(&mut BinaryReader::new(&bytes), &ctx).unwrap();
        for weights in &parsed.weights {
            let sum: f32 = weights.iter().sum();
            assert!((sum - 1.0).abs() <= 1e-6);
        }
        assert_eq!(parsed.weights[1], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(parsed.bone_indices, skin.bone_indices);
        assert!(parsed.split_data.is_empty());
    }

    #[test]
    fn test_skin_requires_geometry_context() {
        let bytes = [0u8; 4];
        let result = SkinPlugin::read(&mut BinaryReader::new(&bytes), &SchemaContext::new(RW_VERSION));
        assert!(matches!(result, Err(Error::InvalidNode { .. })));
    }
}

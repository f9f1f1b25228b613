//! World, plane sector and atomic sector headers.

use glam::Vec3;
use rmdkit_common::{BinaryReader, BinaryWriter};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Result;

/// Struct of a world.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldHeader {
    pub root_is_world_sector: bool,
    pub inverse_origin: Vec3,
    pub triangle_count: u32,
    pub vertex_count: u32,
    pub plane_sector_count: u32,
    pub world_sector_count: u32,
    pub collision_sector_size: u32,
    pub format_flags: u32,
    pub bbox_max: Vec3,
    pub bbox_min: Vec3,
}

impl WorldHeader {
    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            root_is_world_sector: reader.read_bool32()?,
            inverse_origin: reader.read_vec3()?,
            triangle_count: reader.read_u32()?,
            vertex_count: reader.read_u32()?,
            plane_sector_count: reader.read_u32()?,
            world_sector_count: reader.read_u32()?,
            collision_sector_size: reader.read_u32()?,
            format_flags: reader.read_u32()?,
            bbox_max: reader.read_vec3()?,
            bbox_min: reader.read_vec3()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_bool32(self.root_is_world_sector)?;
        writer.write_vec3(self.inverse_origin)?;
        writer.write_u32(self.triangle_count)?;
        writer.write_u32(self.vertex_count)?;
        writer.write_u32(self.plane_sector_count)?;
        writer.write_u32(self.world_sector_count)?;
        writer.write_u32(self.collision_sector_size)?;
        writer.write_u32(self.format_flags)?;
        writer.write_vec3(self.bbox_max)?;
        writer.write_vec3(self.bbox_min)?;
        Ok(())
    }
}

/// Struct of a plane sector: the splitting plane and its two halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct PlaneSectorHeader {
    /// Axis of the splitting plane (0 = x, 4 = y, 8 = z).
    pub plane_type: i32,
    pub value: f32,
    pub left_is_atomic: u32,
    pub right_is_atomic: u32,
    pub left_value: f32,
    pub right_value: f32,
}

/// Struct of an atomic sector.
///
/// Vertex and triangle arrays follow the fixed header; their layout depends
/// on the world's format flags, so they are kept as raw bytes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomicSectorHeader {
    pub material_list_window_base: u32,
    pub triangle_count: u32,
    pub vertex_count: u32,
    pub bbox_max: Vec3,
    pub bbox_min: Vec3,
    pub unused: [u32; 2],
    pub geometry: Vec<u8>,
}

impl AtomicSectorHeader {
    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            material_list_window_base: reader.read_u32()?,
            triangle_count: reader.read_u32()?,
            vertex_count: reader.read_u32()?,
            bbox_max: reader.read_vec3()?,
            bbox_min: reader.read_vec3()?,
            unused: [reader.read_u32()?, reader.read_u32()?],
            geometry: reader.read_bytes(reader.remaining())?.to_vec(),
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.material_list_window_base)?;
        writer.write_u32(self.triangle_count)?;
        writer.write_u32(self.vertex_count)?;
        writer.write_vec3(self.bbox_max)?;
        writer.write_vec3(self.bbox_min)?;
        writer.write_u32(self.unused[0])?;
        writer.write_u32(self.unused[1])?;
        writer.write_bytes(&self.geometry)?;
        Ok(())
    }
}

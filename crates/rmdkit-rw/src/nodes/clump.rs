//! Clump, atomic and geometry list structs.

use rmdkit_common::{BinaryReader, BinaryWriter};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::SchemaContext;
use crate::Result;

/// Libraries after this version store light and camera counts.
const CLUMP_LIGHTS_VERSION: u32 = 0x33000;

/// Struct of a clump: how many atomics, lights and cameras it holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClumpStruct {
    pub atomic_count: u32,
    pub light_count: u32,
    pub camera_count: u32,
}

impl ClumpStruct {
    pub(crate) fn read(reader: &mut BinaryReader<'_>, ctx: &SchemaContext) -> Result<Self> {
        let atomic_count = reader.read_u32()?;
        let (light_count, camera_count) = if ctx.library_version > CLUMP_LIGHTS_VERSION {
            (reader.read_u32()?, reader.read_u32()?)
        } else {
            (0, 0)
        };

        Ok(Self {
            atomic_count,
            light_count,
            camera_count,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter, ctx: &SchemaContext) -> Result<()> {
        writer.write_u32(self.atomic_count)?;
        if ctx.library_version > CLUMP_LIGHTS_VERSION {
            writer.write_u32(self.light_count)?;
            writer.write_u32(self.camera_count)?;
        }
        Ok(())
    }
}

/// Struct of an atomic: which frame and geometry it binds together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct AtomicStruct {
    /// Flat index into the clump's frame list.
    pub frame_index: u32,
    /// Index into the clump's geometry list.
    pub geometry_index: u32,
    /// Render flags (collision test, render).
    pub flags: u32,
    pub unused: u32,
}

/// Struct of a geometry list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryListStruct {
    pub geometry_count: u32,
}

impl GeometryListStruct {
    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            geometry_count: reader.read_u32()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.geometry_count)?;
        Ok(())
    }
}

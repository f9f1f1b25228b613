//! Material, material list and texture reference structs.

use rmdkit_common::{BinaryReader, BinaryWriter};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::geometry::SurfaceProperties;
use super::{bounded_capacity, SchemaContext};
use crate::Result;

/// Libraries after this version store surface properties per material.
const MATERIAL_SURFACE_VERSION: u32 = 0x30400;

/// Struct of a material.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialStruct {
    pub flags: u32,
    /// RGBA color.
    pub color: [u8; 4],
    pub unused: u32,
    /// Non-zero when a texture reference child follows the struct. Kept as
    /// stored; some exporters write values other than 1.
    pub textured: u32,
    pub surface: Option<SurfaceProperties>,
}

impl MaterialStruct {
    /// Whether a texture reference child follows the struct.
    pub fn is_textured(&self) -> bool {
        self.textured != 0
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>, ctx: &SchemaContext) -> Result<Self> {
        let flags = reader.read_u32()?;
        let rgba = reader.read_bytes(4)?;
        let unused = reader.read_u32()?;
        let textured = reader.read_u32()?;
        let surface = if ctx.library_version > MATERIAL_SURFACE_VERSION {
            Some(SurfaceProperties::read(reader)?)
        } else {
            None
        };

        Ok(Self {
            flags,
            color: [rgba[0], rgba[1], rgba[2], rgba[3]],
            unused,
            textured,
            surface,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter, ctx: &SchemaContext) -> Result<()> {
        writer.write_u32(self.flags)?;
        writer.write_bytes(&self.color)?;
        writer.write_u32(self.unused)?;
        writer.write_u32(self.textured)?;
        if ctx.library_version > MATERIAL_SURFACE_VERSION {
            self.surface.unwrap_or_default().write(writer)?;
        }
        Ok(())
    }
}

/// Struct of a material list.
///
/// Each entry is `-1` when the material is defined by a child of the list,
/// or the index of an earlier entry whose material it shares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialListStruct {
    pub indices: Vec<i32>,
}

impl MaterialListStruct {
    /// Number of materials defined by child nodes.
    pub fn defined_count(&self) -> usize {
        self.indices.iter().filter(|&&i| i < 0).count()
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let mut indices = Vec::with_capacity(bounded_capacity(count, 4, reader));
        for _ in 0..count {
            indices.push(reader.read_i32()?);
        }
        Ok(Self { indices })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.indices.len() as u32)?;
        for &index in &self.indices {
            writer.write_i32(index)?;
        }
        Ok(())
    }
}

/// Struct of a texture reference: sampling state for the named texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct TextureReferenceStruct {
    pub filter: u8,
    /// U addressing in the low nibble, V addressing in the high nibble.
    pub addressing: u8,
    pub flags: u16,
}

impl TextureReferenceStruct {
    pub fn address_u(&self) -> u8 {
        self.addressing & 0x0F
    }

    pub fn address_v(&self) -> u8 {
        self.addressing >> 4
    }

    pub fn has_mipmaps(&self) -> bool {
        self.flags & 1 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::RW_VERSION;

    #[test]
    fn test_material_struct_roundtrip() {
        let ctx = SchemaContext::new(RW_VERSION);
        let material = MaterialStruct {
            flags: 0,
            color: [128, 64, 32, 255],
            unused: 0,
            textured: 1,
            surface: Some(SurfaceProperties {
                ambient: 1.0,
                specular: 0.5,
                diffuse: 1.0,
            }),
        };

        let mut writer = BinaryWriter::new();
        material.write(&mut writer, &ctx).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 28);

        let parsed = MaterialStruct::read(&mut BinaryReader::new(&bytes), &ctx).unwrap();
        assert_eq!(parsed, material);
    }

    #[test]
    fn test_material_textured_value_is_kept() {
        // Older library, so no surface properties follow.
        let ctx = SchemaContext::new(0x0310);
        let bytes: Vec<u8> = [0u32, 0xFFFF_FFFF, 0, 2]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let parsed = MaterialStruct::read(&mut BinaryReader::new(&bytes), &ctx).unwrap();
        assert_eq!(parsed.textured, 2);
        assert!(parsed.is_textured());
        assert_eq!(parsed.surface, None);

        let mut writer = BinaryWriter::new();
        parsed.write(&mut writer, &ctx).unwrap();
        assert_eq!(writer.into_inner(), bytes);
    }

    #[test]
    fn test_defined_count() {
        let list = MaterialListStruct {
            indices: vec![-1, -1, 0, -1, 1],
        };
        assert_eq!(list.defined_count(), 3);
    }

    #[test]
    fn test_texture_addressing_nibbles() {
        let tex = TextureReferenceStruct {
            filter: 6,
            addressing: 0x21,
            flags: 1,
        };
        assert_eq!(tex.address_u(), 1);
        assert_eq!(tex.address_v(), 2);
        assert!(tex.has_mipmaps());
        assert_eq!(std::mem::size_of::<TextureReferenceStruct>(), 4);
    }
}

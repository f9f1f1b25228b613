//! Chunk header codec and the chunk tag table.
//!
//! Every node in a RenderWare stream starts with a fixed 12-byte header:
//!
//! ```text
//! 0x00: tag      u32
//! 0x04: size     u32   (payload bytes that follow, children included)
//! 0x08: version  u32   (library id stamp)
//! ```

use std::fmt;

use rmdkit_common::{BinaryReader, BinaryWriter};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Result;

/// Library stamp written on standard RenderWare chunks.
pub const RW_VERSION: u32 = 0x1C02_0037;

/// Library stamp written on RMD extension chunks.
pub const RMD_VERSION: u32 = 0x1C02_000A;

/// First tag value that belongs to the RMD extension range.
pub const RMD_TAG_BOUNDARY: u32 = 0xF0F0_0000;

/// Version stamp a freshly created chunk with this tag is written with.
#[inline]
pub const fn version_for_tag(tag: ChunkId) -> u32 {
    if tag.0 >= RMD_TAG_BOUNDARY {
        RMD_VERSION
    } else {
        RW_VERSION
    }
}

/// Unpack a library id stamp into a comparable library version
/// (e.g. `0x37002` for 3.7.0.2).
///
/// Stamps from very old exporters carry the version directly in the
/// low bits and are shifted into the same range.
#[inline]
pub const fn unpack_library_version(stamp: u32) -> u32 {
    if stamp & 0xFFFF_0000 != 0 {
        (((stamp >> 14) & 0x3_FF00) + 0x3_0000) | ((stamp >> 16) & 0x3F)
    } else {
        stamp << 8
    }
}

/// A chunk type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ChunkId(pub u32);

impl ChunkId {
    pub const STRUCT: Self = Self(0x01);
    pub const STRING: Self = Self(0x02);
    pub const EXTENSION: Self = Self(0x03);
    pub const TEXTURE: Self = Self(0x06);
    pub const MATERIAL: Self = Self(0x07);
    pub const MATERIAL_LIST: Self = Self(0x08);
    pub const ATOMIC_SECTOR: Self = Self(0x09);
    pub const PLANE_SECTOR: Self = Self(0x0A);
    pub const WORLD: Self = Self(0x0B);
    pub const FRAME_LIST: Self = Self(0x0E);
    pub const GEOMETRY: Self = Self(0x0F);
    pub const CLUMP: Self = Self(0x10);
    pub const ATOMIC: Self = Self(0x14);
    pub const TEXTURE_NATIVE: Self = Self(0x15);
    pub const TEXTURE_DICTIONARY: Self = Self(0x16);
    pub const GEOMETRY_LIST: Self = Self(0x1A);
    pub const ANIMATION: Self = Self(0x1B);
    pub const UV_ANIMATION_DICTIONARY: Self = Self(0x2B);

    pub const SKY_MIPMAP: Self = Self(0x110);
    pub const SKIN: Self = Self(0x116);
    pub const HANIM: Self = Self(0x11E);
    pub const MESH_LIST: Self = Self(0x50E);

    pub const RMD_ANIMATION_PLACEHOLDER: Self = Self(0xF0F0_0001);
    pub const RMD_ANIMATION_INSTANCE: Self = Self(0xF0F0_0002);
    pub const RMD_ANIMATION_TERMINATOR: Self = Self(0xF0F0_0003);
    pub const RMD_TRANSFORM_OVERRIDE: Self = Self(0xF0F0_0004);
    pub const RMD_VISIBILITY_ANIMATION: Self = Self(0xF0F0_0005);
    pub const RMD_ANIMATION_COUNT: Self = Self(0xF0F0_0006);
    pub const RMD_NODE_LINK_LIST: Self = Self(0xF0F0_0080);
    pub const RMD_AUTHOR: Self = Self(0xF0F0_00F0);

    /// Human-readable name of a known tag.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::STRUCT => "Struct",
            Self::STRING => "String",
            Self::EXTENSION => "Extension",
            Self::TEXTURE => "Texture",
            Self::MATERIAL => "Material",
            Self::MATERIAL_LIST => "MaterialList",
            Self::ATOMIC_SECTOR => "AtomicSector",
            Self::PLANE_SECTOR => "PlaneSector",
            Self::WORLD => "World",
            Self::FRAME_LIST => "FrameList",
            Self::GEOMETRY => "Geometry",
            Self::CLUMP => "Clump",
            Self::ATOMIC => "Atomic",
            Self::TEXTURE_NATIVE => "TextureNative",
            Self::TEXTURE_DICTIONARY => "TextureDictionary",
            Self::GEOMETRY_LIST => "GeometryList",
            Self::ANIMATION => "Animation",
            Self::UV_ANIMATION_DICTIONARY => "UvAnimationDictionary",
            Self::SKY_MIPMAP => "SkyMipmap",
            Self::SKIN => "Skin",
            Self::HANIM => "HAnim",
            Self::MESH_LIST => "MeshList",
            Self::RMD_ANIMATION_PLACEHOLDER => "RmdAnimationPlaceholder",
            Self::RMD_ANIMATION_INSTANCE => "RmdAnimationInstance",
            Self::RMD_ANIMATION_TERMINATOR => "RmdAnimationTerminator",
            Self::RMD_TRANSFORM_OVERRIDE => "RmdTransformOverride",
            Self::RMD_VISIBILITY_ANIMATION => "RmdVisibilityAnimation",
            Self::RMD_ANIMATION_COUNT => "RmdAnimationCount",
            Self::RMD_NODE_LINK_LIST => "RmdNodeLinkList",
            Self::RMD_AUTHOR => "RmdAuthor",
            _ => return None,
        })
    }

    /// Whether this tag is in the RMD extension range.
    #[inline]
    pub const fn is_rmd_extension(self) -> bool {
        self.0 >= RMD_TAG_BOUNDARY
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({:#x})", name, self.0),
            None => write!(f, "ChunkId({:#x})", self.0),
        }
    }
}

/// The 12-byte chunk header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ChunkHeader {
    /// Chunk type tag.
    pub tag: u32,
    /// Payload size in bytes, children included.
    pub size: u32,
    /// Library id stamp.
    pub version: u32,
}

impl ChunkHeader {
    /// Encoded header size.
    pub const SIZE: usize = 12;

    /// Create a header.
    pub fn new(tag: ChunkId, size: u32, version: u32) -> Self {
        Self {
            tag: tag.0,
            size,
            version,
        }
    }

    /// The header's tag.
    #[inline]
    pub fn id(&self) -> ChunkId {
        ChunkId(self.tag)
    }
}

/// Read a chunk header, consuming exactly 12 bytes.
pub fn read_header(reader: &mut BinaryReader<'_>) -> Result<ChunkHeader> {
    Ok(reader.read_struct::<ChunkHeader>()?)
}

/// Read a chunk header and rewind so the stream position is unchanged.
pub fn peek_header(reader: &mut BinaryReader<'_>) -> Result<ChunkHeader> {
    let header = read_header(reader)?;
    reader.rewind(ChunkHeader::SIZE);
    Ok(header)
}

/// Reserve space for a header whose size is not yet known.
///
/// Returns the offset to pass to [`patch_header`].
pub fn write_header_placeholder(writer: &mut BinaryWriter) -> Result<usize> {
    let offset = writer.position();
    writer.write_zeros(ChunkHeader::SIZE)?;
    Ok(offset)
}

/// Overwrite a previously reserved header.
pub fn patch_header(writer: &mut BinaryWriter, offset: usize, header: ChunkHeader) -> Result<()> {
    writer.patch_u32(offset, header.tag)?;
    writer.patch_u32(offset + 4, header.size)?;
    writer.patch_u32(offset + 8, header.version)?;
    Ok(())
}

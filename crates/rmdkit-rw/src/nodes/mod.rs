//! Typed node payloads.
//!
//! A node's [`NodeBody`] holds only the bytes the node itself owns. Container
//! nodes (clump, geometry, extension, ...) carry no payload of their own;
//! their content is their ordered children in the [`NodeTree`](crate::NodeTree).
//!
//! # Schemas
//!
//! - Scene graph: [`ClumpStruct`], [`AtomicStruct`], [`GeometryListStruct`],
//!   [`FrameListStruct`]
//! - Geometry: [`GeometryStruct`], [`MeshList`]
//! - Materials: [`MaterialStruct`], [`MaterialListStruct`],
//!   [`TextureReferenceStruct`]
//! - Textures: [`TextureDictionaryStruct`], [`TextureStruct`], [`RasterInfo`]
//! - Worlds: [`WorldHeader`], [`PlaneSectorHeader`], [`AtomicSectorHeader`]
//! - Plugins: [`HAnimPlugin`], [`SkinPlugin`], [`SkyMipmap`]
//! - RMD extensions: [`NodeLinkList`], [`AnimationCount`]

mod clump;
mod frame;
mod geometry;
mod material;
mod plugin;
mod rmd;
mod texture;
mod world;

pub use clump::{AtomicStruct, ClumpStruct, GeometryListStruct};
pub use frame::{Frame, FrameListStruct, FRAME_SIZE};
pub use geometry::{
    geometry_flags, GeometryStruct, Mesh, MeshList, MorphTarget, SurfaceProperties, Triangle,
};
pub use material::{MaterialListStruct, MaterialStruct, TextureReferenceStruct};
pub use plugin::{normalize_weights, HAnimNode, HAnimPlugin, SkinPlugin, SkyMipmap, HANIM_VERSION};
pub use rmd::{AnimationCount, NodeLink, NodeLinkList};
pub use texture::{RasterInfo, TextureDictionaryStruct, TextureStruct, PLATFORM_PS2};
pub use world::{AtomicSectorHeader, PlaneSectorHeader, WorldHeader};

use rmdkit_common::{BinaryReader, BinaryWriter};

use crate::chunk::unpack_library_version;
use crate::{ChunkId, Result};

/// The payload of a node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeBody {
    /// No payload of its own; content is the node's children.
    Container,
    /// Second struct under a texture native: holds raster info and data.
    RasterStruct,
    /// A chunk with an empty payload (RMD placeholders and terminators).
    Empty,
    String(String),
    ClumpStruct(ClumpStruct),
    FrameListStruct(FrameListStruct),
    GeometryListStruct(GeometryListStruct),
    GeometryStruct(GeometryStruct),
    MaterialStruct(MaterialStruct),
    MaterialListStruct(MaterialListStruct),
    TextureReferenceStruct(TextureReferenceStruct),
    AtomicStruct(AtomicStruct),
    TextureDictionaryStruct(TextureDictionaryStruct),
    TextureStruct(TextureStruct),
    RasterInfo(RasterInfo),
    RasterData(Vec<u8>),
    WorldHeader(WorldHeader),
    PlaneSectorHeader(PlaneSectorHeader),
    AtomicSectorHeader(AtomicSectorHeader),
    HAnim(HAnimPlugin),
    Skin(SkinPlugin),
    MeshList(MeshList),
    SkyMipmap(SkyMipmap),
    NodeLinkList(NodeLinkList),
    AnimationCount(AnimationCount),
    /// Payload of a chunk with no known schema, kept byte for byte.
    Opaque(Vec<u8>),
}

impl NodeBody {
    /// Whether this body's node owns children.
    pub fn is_container(&self) -> bool {
        matches!(self, NodeBody::Container | NodeBody::RasterStruct)
    }

    /// Short name of the schema, for diagnostics.
    pub fn schema_name(&self) -> &'static str {
        match self {
            NodeBody::Container => "container",
            NodeBody::RasterStruct => "raster struct",
            NodeBody::Empty => "empty",
            NodeBody::String(_) => "string",
            NodeBody::ClumpStruct(_) => "clump struct",
            NodeBody::FrameListStruct(_) => "frame list struct",
            NodeBody::GeometryListStruct(_) => "geometry list struct",
            NodeBody::GeometryStruct(_) => "geometry struct",
            NodeBody::MaterialStruct(_) => "material struct",
            NodeBody::MaterialListStruct(_) => "material list struct",
            NodeBody::TextureReferenceStruct(_) => "texture reference struct",
            NodeBody::AtomicStruct(_) => "atomic struct",
            NodeBody::TextureDictionaryStruct(_) => "texture dictionary struct",
            NodeBody::TextureStruct(_) => "texture struct",
            NodeBody::RasterInfo(_) => "raster info",
            NodeBody::RasterData(_) => "raster data",
            NodeBody::WorldHeader(_) => "world header",
            NodeBody::PlaneSectorHeader(_) => "plane sector header",
            NodeBody::AtomicSectorHeader(_) => "atomic sector header",
            NodeBody::HAnim(_) => "hanim",
            NodeBody::Skin(_) => "skin",
            NodeBody::MeshList(_) => "mesh list",
            NodeBody::SkyMipmap(_) => "sky mipmap",
            NodeBody::NodeLinkList(_) => "node link list",
            NodeBody::AnimationCount(_) => "animation count",
            NodeBody::Opaque(_) => "opaque",
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            NodeBody::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_geometry_struct(&self) -> Option<&GeometryStruct> {
        match self {
            NodeBody::GeometryStruct(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_frame_list_struct(&self) -> Option<&FrameListStruct> {
        match self {
            NodeBody::FrameListStruct(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_hanim(&self) -> Option<&HAnimPlugin> {
        match self {
            NodeBody::HAnim(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_skin(&self) -> Option<&SkinPlugin> {
        match self {
            NodeBody::Skin(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_link_list(&self) -> Option<&NodeLinkList> {
        match self {
            NodeBody::NodeLinkList(n) => Some(n),
            _ => None,
        }
    }

    /// Read a leaf payload of the given schema.
    pub(crate) fn read(
        schema: Schema,
        reader: &mut BinaryReader<'_>,
        ctx: &SchemaContext,
    ) -> Result<Self> {
        Ok(match schema {
            Schema::Container => NodeBody::Container,
            Schema::RasterStruct => NodeBody::RasterStruct,
            Schema::Empty => NodeBody::Empty,
            Schema::String => NodeBody::String(reader.read_rw_string(reader.remaining())?),
            Schema::ClumpStruct => NodeBody::ClumpStruct(ClumpStruct::read(reader, ctx)?),
            Schema::FrameListStruct => NodeBody::FrameListStruct(FrameListStruct::read(reader)?),
            Schema::GeometryListStruct => {
                NodeBody::GeometryListStruct(GeometryListStruct::read(reader)?)
            }
            Schema::GeometryStruct => {
                NodeBody::GeometryStruct(GeometryStruct::read(reader, ctx)?)
            }
            Schema::MaterialStruct => {
                NodeBody::MaterialStruct(MaterialStruct::read(reader, ctx)?)
            }
            Schema::MaterialListStruct => {
                NodeBody::MaterialListStruct(MaterialListStruct::read(reader)?)
            }
            Schema::TextureReferenceStruct => {
                NodeBody::TextureReferenceStruct(reader.read_struct()?)
            }
            Schema::AtomicStruct => NodeBody::AtomicStruct(reader.read_struct()?),
            Schema::TextureDictionaryStruct => {
                NodeBody::TextureDictionaryStruct(reader.read_struct()?)
            }
            Schema::TextureStruct => NodeBody::TextureStruct(reader.read_struct()?),
            Schema::RasterInfo => NodeBody::RasterInfo(reader.read_struct()?),
            Schema::RasterData => NodeBody::RasterData(reader.read_bytes(reader.remaining())?.to_vec()),
            Schema::WorldHeader => NodeBody::WorldHeader(WorldHeader::read(reader)?),
            Schema::PlaneSectorHeader => NodeBody::PlaneSectorHeader(reader.read_struct()?),
            Schema::AtomicSectorHeader => {
                NodeBody::AtomicSectorHeader(AtomicSectorHeader::read(reader)?)
            }
            Schema::HAnim => NodeBody::HAnim(HAnimPlugin::read(reader)?),
            Schema::Skin => NodeBody::Skin(SkinPlugin::read(reader, ctx)?),
            Schema::MeshList => NodeBody::MeshList(MeshList::read(reader, ctx)?),
            Schema::SkyMipmap => NodeBody::SkyMipmap(SkyMipmap::read(reader)?),
            Schema::NodeLinkList => NodeBody::NodeLinkList(NodeLinkList::read(reader)?),
            Schema::AnimationCount => NodeBody::AnimationCount(AnimationCount::read(reader)?),
            Schema::Opaque => NodeBody::Opaque(reader.read_bytes(reader.remaining())?.to_vec()),
        })
    }

    /// Write this payload. Containers write nothing; their children follow.
    pub(crate) fn write(&self, writer: &mut BinaryWriter, ctx: &SchemaContext) -> Result<()> {
        match self {
            NodeBody::Container | NodeBody::RasterStruct | NodeBody::Empty => Ok(()),
            NodeBody::String(s) => {
                writer.write_rw_string(s)?;
                Ok(())
            }
            NodeBody::ClumpStruct(c) => c.write(writer, ctx),
            NodeBody::FrameListStruct(f) => f.write(writer),
            NodeBody::GeometryListStruct(g) => g.write(writer),
            NodeBody::GeometryStruct(g) => g.write(writer, ctx),
            NodeBody::MaterialStruct(m) => m.write(writer, ctx),
            NodeBody::MaterialListStruct(m) => m.write(writer),
            NodeBody::TextureReferenceStruct(t) => Ok(writer.write_struct(t)?),
            NodeBody::AtomicStruct(a) => Ok(writer.write_struct(a)?),
            NodeBody::TextureDictionaryStruct(t) => Ok(writer.write_struct(t)?),
            NodeBody::TextureStruct(t) => Ok(writer.write_struct(t)?),
            NodeBody::RasterInfo(r) => Ok(writer.write_struct(r)?),
            NodeBody::RasterData(bytes) | NodeBody::Opaque(bytes) => Ok(writer.write_bytes(bytes)?),
            NodeBody::WorldHeader(w) => w.write(writer),
            NodeBody::PlaneSectorHeader(p) => Ok(writer.write_struct(p)?),
            NodeBody::AtomicSectorHeader(a) => a.write(writer),
            NodeBody::HAnim(h) => h.write(writer),
            NodeBody::Skin(s) => s.write(writer),
            NodeBody::MeshList(m) => m.write(writer, ctx),
            NodeBody::SkyMipmap(s) => s.write(writer),
            NodeBody::NodeLinkList(n) => n.write(writer),
            NodeBody::AnimationCount(a) => a.write(writer),
        }
    }
}

/// The schema a chunk's payload is decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Schema {
    Container,
    RasterStruct,
    Empty,
    String,
    ClumpStruct,
    FrameListStruct,
    GeometryListStruct,
    GeometryStruct,
    MaterialStruct,
    MaterialListStruct,
    TextureReferenceStruct,
    AtomicStruct,
    TextureDictionaryStruct,
    TextureStruct,
    RasterInfo,
    RasterData,
    WorldHeader,
    PlaneSectorHeader,
    AtomicSectorHeader,
    HAnim,
    Skin,
    MeshList,
    SkyMipmap,
    NodeLinkList,
    AnimationCount,
    Opaque,
}

impl Schema {
    /// Schema for a chunk identified by its own tag.
    ///
    /// Struct chunks are resolved from their context instead; unknown tags
    /// fall back to [`Schema::Opaque`].
    pub(crate) fn for_tag(tag: ChunkId) -> Self {
        match tag {
            ChunkId::STRING => Schema::String,
            ChunkId::EXTENSION
            | ChunkId::TEXTURE
            | ChunkId::MATERIAL
            | ChunkId::MATERIAL_LIST
            | ChunkId::ATOMIC_SECTOR
            | ChunkId::PLANE_SECTOR
            | ChunkId::WORLD
            | ChunkId::FRAME_LIST
            | ChunkId::GEOMETRY
            | ChunkId::CLUMP
            | ChunkId::ATOMIC
            | ChunkId::TEXTURE_NATIVE
            | ChunkId::TEXTURE_DICTIONARY
            | ChunkId::GEOMETRY_LIST
            | ChunkId::RMD_ANIMATION_INSTANCE => Schema::Container,
            ChunkId::SKY_MIPMAP => Schema::SkyMipmap,
            ChunkId::SKIN => Schema::Skin,
            ChunkId::HANIM => Schema::HAnim,
            ChunkId::MESH_LIST => Schema::MeshList,
            ChunkId::RMD_ANIMATION_PLACEHOLDER | ChunkId::RMD_ANIMATION_TERMINATOR => Schema::Empty,
            ChunkId::RMD_ANIMATION_COUNT => Schema::AnimationCount,
            ChunkId::RMD_NODE_LINK_LIST => Schema::NodeLinkList,
            _ => Schema::Opaque,
        }
    }

    /// Whether nodes of this schema own children.
    pub(crate) fn is_container(self) -> bool {
        matches!(self, Schema::Container | Schema::RasterStruct)
    }
}

/// What the enclosing geometry says about a plugin's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryInfo {
    pub vertex_count: u32,
    pub native: bool,
}

/// Context a payload schema needs beyond its own bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaContext {
    /// Unpacked library version of the node being read or written.
    pub library_version: u32,
    /// The enclosing geometry, for plugins whose layout depends on it.
    pub geometry: Option<GeometryInfo>,
}

impl SchemaContext {
    /// Context for a node stamped with `version`.
    pub fn new(version: u32) -> Self {
        Self {
            library_version: unpack_library_version(version),
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Option<GeometryInfo>) -> Self {
        self.geometry = geometry;
        self
    }
}

/// Capacity to reserve for `count` records of `record_size` bytes, capped by
/// what the reader can still supply.
#[inline]
pub(crate) fn bounded_capacity(count: usize, record_size: usize, reader: &BinaryReader<'_>) -> usize {
    count.min(reader.remaining() / record_size.max(1))
}

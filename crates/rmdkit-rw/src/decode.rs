//! Recursive chunk decoder.
//!
//! The decoder walks the stream depth first, resolving each chunk's schema
//! from its tag. Struct chunks carry no schema of their own: their meaning
//! comes from the enclosing container, and inside texture natives and
//! raster structs from how many structs that container has already seen.

use log::{debug, trace};
use rmdkit_common::BinaryReader;

use crate::chunk::{read_header, ChunkHeader};
use crate::nodes::{NodeBody, Schema};
use crate::tree::{NodeId, NodeTree, MAX_NESTING_DEPTH};
use crate::{ChunkId, Error, Result};

/// Which struct a texture native expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureNativeSlot {
    ExpectTexture,
    ExpectRaster,
    Done,
}

/// Which struct a raster struct expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RasterSlot {
    ExpectInfo,
    ExpectData,
    Done,
}

/// How a container resolves the struct chunks directly under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StructSlots {
    /// One schema, fixed by the container's tag.
    ByParent,
    TextureNative(TextureNativeSlot),
    Raster(RasterSlot),
}

impl StructSlots {
    fn for_container(tag: ChunkId, schema: Schema) -> Self {
        if schema == Schema::RasterStruct {
            StructSlots::Raster(RasterSlot::ExpectInfo)
        } else if tag == ChunkId::TEXTURE_NATIVE {
            StructSlots::TextureNative(TextureNativeSlot::ExpectTexture)
        } else {
            StructSlots::ByParent
        }
    }
}

/// A container whose children are being decoded.
struct Container {
    id: NodeId,
    tag: ChunkId,
    slots: StructSlots,
}

/// Schema of a struct chunk under a container with a fixed struct layout.
fn struct_schema_for(parent: ChunkId) -> Schema {
    match parent {
        ChunkId::CLUMP => Schema::ClumpStruct,
        ChunkId::FRAME_LIST => Schema::FrameListStruct,
        ChunkId::GEOMETRY_LIST => Schema::GeometryListStruct,
        ChunkId::GEOMETRY => Schema::GeometryStruct,
        ChunkId::MATERIAL => Schema::MaterialStruct,
        ChunkId::MATERIAL_LIST => Schema::MaterialListStruct,
        ChunkId::TEXTURE => Schema::TextureReferenceStruct,
        ChunkId::ATOMIC => Schema::AtomicStruct,
        ChunkId::TEXTURE_DICTIONARY => Schema::TextureDictionaryStruct,
        ChunkId::WORLD => Schema::WorldHeader,
        ChunkId::PLANE_SECTOR => Schema::PlaneSectorHeader,
        ChunkId::ATOMIC_SECTOR => Schema::AtomicSectorHeader,
        _ => Schema::Opaque,
    }
}

struct Decoder<'t> {
    tree: &'t mut NodeTree,
}

impl Decoder<'_> {
    /// Resolve the schema of a struct chunk and advance the container's
    /// positional state.
    fn resolve_struct(&self, parent: Option<&mut Container>, offset: usize) -> Result<Schema> {
        let Some(parent) = parent else {
            return Ok(Schema::Opaque);
        };

        use RasterSlot::*;
        use TextureNativeSlot::*;

        let (schema, next) = match parent.slots {
            StructSlots::ByParent => return Ok(struct_schema_for(parent.tag)),
            StructSlots::TextureNative(ExpectTexture) => {
                (Schema::TextureStruct, StructSlots::TextureNative(ExpectRaster))
            }
            StructSlots::TextureNative(ExpectRaster) => {
                (Schema::RasterStruct, StructSlots::TextureNative(TextureNativeSlot::Done))
            }
            StructSlots::Raster(ExpectInfo) => (Schema::RasterInfo, StructSlots::Raster(ExpectData)),
            StructSlots::Raster(ExpectData) => {
                (Schema::RasterData, StructSlots::Raster(RasterSlot::Done))
            }
            StructSlots::TextureNative(TextureNativeSlot::Done)
            | StructSlots::Raster(RasterSlot::Done) => return Err(self.ambiguous(parent, offset)),
        };
        parent.slots = next;
        Ok(schema)
    }

    fn ambiguous(&self, parent: &Container, offset: usize) -> Error {
        Error::AmbiguousStruct {
            offset,
            parent: parent.tag,
            grandparent: self.tree.parent(parent.id).and_then(|g| self.tree.tag(g)),
        }
    }

    /// Decode one chunk, and recursively its children, from `reader`.
    ///
    /// `depth` is the nesting level of the chunk, 0 for a root.
    fn decode(
        &mut self,
        reader: &mut BinaryReader<'_>,
        parent: Option<&mut Container>,
        depth: usize,
    ) -> Result<NodeId> {
        let offset = reader.offset();
        let header = read_header(reader)?;
        let tag = header.id();
        let declared = header.size;

        if depth >= MAX_NESTING_DEPTH {
            return Err(Error::NestingTooDeep { tag, offset });
        }

        if declared as usize > reader.remaining() {
            return Err(Error::Truncated {
                tag,
                offset,
                declared,
                available: reader.remaining(),
            });
        }

        let parent_id = parent.as_ref().map(|p| p.id);
        let mut schema = if tag == ChunkId::STRUCT {
            self.resolve_struct(parent, offset)?
        } else {
            Schema::for_tag(tag)
        };

        let ctx = self.tree.context_under(parent_id, header.version);
        if schema == Schema::Skin && ctx.geometry.is_none() {
            debug!("skin at {:#x} has no enclosing geometry, keeping it opaque", offset);
            schema = Schema::Opaque;
        }
        if schema == Schema::Empty && declared != 0 {
            schema = Schema::Opaque;
        }
        if schema == Schema::Opaque {
            debug!("no schema for {} at {:#x}, keeping {} bytes", tag, offset, declared);
        }
        trace!("{} at {:#x}: {} bytes as {:?}", tag, offset, declared, schema);

        let mut body_reader = reader.sub_reader(declared as usize)?;
        let body = NodeBody::read(schema, &mut body_reader, &ctx)?;
        if !schema.is_container() && !body_reader.is_empty() {
            return Err(Error::SizeMismatch {
                tag,
                offset,
                declared,
                consumed: body_reader.position(),
            });
        }

        let id = self.tree.add_with_version(tag, header.version, body);
        self.tree.get(id)?.set_payload_size(declared);
        if let Some(parent_id) = parent_id {
            self.tree.attach_child(parent_id, id)?;
        }

        if schema.is_container() {
            let mut container = Container {
                id,
                tag,
                slots: StructSlots::for_container(tag, schema),
            };
            while !body_reader.is_empty() {
                if body_reader.remaining() < ChunkHeader::SIZE {
                    return Err(Error::SizeMismatch {
                        tag,
                        offset,
                        declared,
                        consumed: body_reader.position(),
                    });
                }
                self.decode(&mut body_reader, Some(&mut container), depth + 1)?;
            }
        }

        Ok(id)
    }
}

impl NodeTree {
    /// Decode exactly one chunk, with its children, from `data`.
    ///
    /// Fails with [`Error::TrailingData`] if bytes follow the chunk. On any
    /// error the tree is left as it was.
    pub fn load_node(&mut self, data: &[u8]) -> Result<NodeId> {
        let mark = self.len();
        let result = decode_one(self, data);
        if result.is_err() {
            self.truncate(mark);
        }
        result
    }

    /// Decode sibling chunks from `data` until it is exhausted.
    ///
    /// On any error the tree is left as it was.
    pub fn load_all(&mut self, data: &[u8]) -> Result<Vec<NodeId>> {
        let mark = self.len();
        let result = decode_siblings(self, data);
        if result.is_err() {
            self.truncate(mark);
        }
        result
    }

    /// Decode a whole stream into a fresh tree.
    pub fn parse(data: &[u8]) -> Result<(Self, Vec<NodeId>)> {
        let mut tree = Self::new();
        let roots = tree.load_all(data)?;
        Ok((tree, roots))
    }
}

fn decode_one(tree: &mut NodeTree, data: &[u8]) -> Result<NodeId> {
    let mut reader = BinaryReader::new(data);
    let id = Decoder { tree }.decode(&mut reader, None, 0)?;
    if !reader.is_empty() {
        return Err(Error::TrailingData {
            offset: reader.offset(),
            remaining: reader.remaining(),
        });
    }
    Ok(id)
}

fn decode_siblings(tree: &mut NodeTree, data: &[u8]) -> Result<Vec<NodeId>> {
    let mut reader = BinaryReader::new(data);
    let mut decoder = Decoder { tree };
    let mut roots = Vec::new();
    while !reader.is_empty() {
        roots.push(decoder.decode(&mut reader, None, 0)?);
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{RMD_VERSION, RW_VERSION};
    use crate::nodes::PLATFORM_PS2;
    use rmdkit_common::BinaryWriter;

    fn chunk(tag: ChunkId, version: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + payload.len());
        out.extend_from_slice(&tag.0.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn rw(tag: ChunkId, payload: &[u8]) -> Vec<u8> {
        chunk(tag, RW_VERSION, payload)
    }

    fn texture_native(raster_data: &[u8]) -> Vec<u8> {
        let mut texture_struct = Vec::new();
        texture_struct.extend_from_slice(&PLATFORM_PS2.to_le_bytes());
        texture_struct.extend_from_slice(&0x1106u32.to_le_bytes());

        let mut info = vec![0u8; 64];
        info[0..4].copy_from_slice(&32u32.to_le_bytes());
        info[4..8].copy_from_slice(&16u32.to_le_bytes());

        let raster = [rw(ChunkId::STRUCT, &info), rw(ChunkId::STRUCT, raster_data)].concat();

        let body = [
            rw(ChunkId::STRUCT, &texture_struct),
            rw(ChunkId::STRING, b"body\0\0\0\0"),
            rw(ChunkId::STRING, b"\0\0\0\0"),
            rw(ChunkId::STRUCT, &raster),
            rw(ChunkId::EXTENSION, &[]),
        ]
        .concat();
        rw(ChunkId::TEXTURE_NATIVE, &body)
    }

    /// `levels` extension headers, each wrapping the next.
    fn nested_extensions(levels: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(levels * ChunkHeader::SIZE);
        for level in 0..levels {
            let size = ((levels - 1 - level) * ChunkHeader::SIZE) as u32;
            data.extend_from_slice(&ChunkId::EXTENSION.0.to_le_bytes());
            data.extend_from_slice(&size.to_le_bytes());
            data.extend_from_slice(&RW_VERSION.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_texture_native_structs_resolve_by_position() {
        let data = texture_native(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut tree = NodeTree::new();
        let native = tree.load_node(&data).unwrap();

        let structs: Vec<_> = tree.children_with_tag(native, ChunkId::STRUCT).collect();
        assert_eq!(structs.len(), 2);

        let first = &tree.get(structs[0]).unwrap().body;
        assert!(matches!(first, NodeBody::TextureStruct(t) if t.platform_id == PLATFORM_PS2));

        let raster = tree.get(structs[1]).unwrap();
        assert_eq!(raster.body, NodeBody::RasterStruct);
        let raster_children = raster.children();
        assert_eq!(raster_children.len(), 2);
        assert!(matches!(
            &tree.get(raster_children[0]).unwrap().body,
            NodeBody::RasterInfo(info) if info.width == 32 && info.height == 16
        ));
        assert_eq!(
            tree.get(raster_children[1]).unwrap().body,
            NodeBody::RasterData(vec![1, 2, 3, 4, 5, 6, 7, 8])
        );
    }

    #[test]
    fn test_third_struct_under_texture_native_is_ambiguous() {
        let body = [
            rw(ChunkId::STRUCT, &[0; 8]),
            rw(ChunkId::STRUCT, &[]),
            rw(ChunkId::STRUCT, &[0; 4]),
        ]
        .concat();
        let dictionary = rw(
            ChunkId::TEXTURE_DICTIONARY,
            &[rw(ChunkId::STRUCT, &[1, 0, 6, 0]), rw(ChunkId::TEXTURE_NATIVE, &body)].concat(),
        );

        let mut tree = NodeTree::new();
        let err = tree.load_node(&dictionary).unwrap_err();
        assert!(matches!(
            err,
            Error::AmbiguousStruct {
                parent: ChunkId::TEXTURE_NATIVE,
                grandparent: Some(ChunkId::TEXTURE_DICTIONARY),
                ..
            }
        ));
        assert!(err.is_malformed());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_third_struct_under_raster_is_ambiguous() {
        let mut info = vec![0u8; 64];
        info[0..4].copy_from_slice(&8u32.to_le_bytes());
        let raster = [
            rw(ChunkId::STRUCT, &info),
            rw(ChunkId::STRUCT, &[1, 2, 3, 4]),
            rw(ChunkId::STRUCT, &[5, 6, 7, 8]),
        ]
        .concat();
        let body = [rw(ChunkId::STRUCT, &[0; 8]), rw(ChunkId::STRUCT, &raster)].concat();
        let native = rw(ChunkId::TEXTURE_NATIVE, &body);

        let mut tree = NodeTree::new();
        let err = tree.load_node(&native).unwrap_err();
        // Header of the native, the texture struct and the raster struct,
        // then the raster info and raster data chunks.
        let third = 12 + (12 + 8) + 12 + (12 + 64) + (12 + 4);
        assert!(matches!(
            err,
            Error::AmbiguousStruct {
                offset,
                parent: ChunkId::STRUCT,
                grandparent: Some(ChunkId::TEXTURE_NATIVE),
            } if offset == third
        ));
        assert!(err.is_malformed());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let data = nested_extensions(10_000);
        let mut tree = NodeTree::new();
        let err = tree.load_node(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::NestingTooDeep { tag: ChunkId::EXTENSION, offset }
                if offset == MAX_NESTING_DEPTH * ChunkHeader::SIZE
        ));
        assert!(err.is_malformed());
        assert!(tree.is_empty());

        assert!(matches!(tree.load_all(&data), Err(Error::NestingTooDeep { .. })));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_nesting_up_to_the_limit_roundtrips() {
        let data = nested_extensions(MAX_NESTING_DEPTH);
        let mut tree = NodeTree::new();
        let root = tree.load_node(&data).unwrap();
        let deepest = tree.iter_subtree(root).map(|(_, depth)| depth).max();
        assert_eq!(deepest, Some(MAX_NESTING_DEPTH - 1));
        assert_eq!(tree.save_node(root).unwrap(), data);

        let one_more = nested_extensions(MAX_NESTING_DEPTH + 1);
        assert!(matches!(
            NodeTree::new().load_node(&one_more),
            Err(Error::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_unknown_tag_is_opaque_and_verbatim() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03];
        let data = chunk(ChunkId(0x0253_F2FE), RMD_VERSION, &payload);

        let mut tree = NodeTree::new();
        let id = tree.load_node(&data).unwrap();
        let node = tree.get(id).unwrap();
        assert_eq!(node.body, NodeBody::Opaque(payload.to_vec()));
        assert_eq!(node.version, RMD_VERSION);
        assert_eq!(node.payload_size(), payload.len() as u32);

        assert_eq!(tree.save_node(id).unwrap(), data);
    }

    #[test]
    fn test_declared_size_beyond_stream_is_truncated() {
        let mut data = rw(ChunkId::CLUMP, &[0; 8]);
        data[4..8].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());

        let err = NodeTree::new().load_node(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                tag: ChunkId::CLUMP,
                offset: 0,
                available: 8,
                ..
            }
        ));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_short_header_is_eof() {
        let err = NodeTree::new().load_all(&[0x10, 0, 0, 0, 4]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_leaf_must_consume_declared_size() {
        // Clump struct with a trailing byte the schema does not own.
        let clump = rw(ChunkId::CLUMP, &rw(ChunkId::STRUCT, &[0; 13]));
        let err = NodeTree::new().load_node(&clump).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { tag: ChunkId::STRUCT, declared: 13, consumed: 12, .. }));
    }

    #[test]
    fn test_container_leftover_bytes_are_a_size_mismatch() {
        let body = [rw(ChunkId::EXTENSION, &[]), vec![0, 0, 0, 0]].concat();
        let clump = rw(ChunkId::CLUMP, &body);
        let err = NodeTree::new().load_node(&clump).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { tag: ChunkId::CLUMP, .. }));
    }

    #[test]
    fn test_trailing_data_after_single_node() {
        let data = [rw(ChunkId::EXTENSION, &[]), rw(ChunkId::EXTENSION, &[])].concat();
        let mut tree = NodeTree::new();
        assert!(matches!(tree.load_node(&data), Err(Error::TrailingData { offset: 12, remaining: 12 })));
        assert_eq!(tree.load_all(&data).unwrap().len(), 2);
    }

    #[test]
    fn test_top_level_struct_is_opaque() {
        let data = rw(ChunkId::STRUCT, &[1, 2, 3, 4]);
        let mut tree = NodeTree::new();
        let id = tree.load_node(&data).unwrap();
        assert_eq!(tree.get(id).unwrap().body, NodeBody::Opaque(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_skin_without_geometry_is_opaque() {
        let data = rw(ChunkId::EXTENSION, &rw(ChunkId::SKIN, &[0, 0, 0, 0]));
        let mut tree = NodeTree::new();
        let ext = tree.load_node(&data).unwrap();
        let skin = tree.children(ext)[0];
        assert_eq!(tree.get(skin).unwrap().body, NodeBody::Opaque(vec![0, 0, 0, 0]));
    }

    #[test]
    fn test_payload_sizes_match_headers_after_write() {
        let data = texture_native(&[9; 12]);
        let mut tree = NodeTree::new();
        let native = tree.load_node(&data).unwrap();

        let mut writer = BinaryWriter::new();
        tree.write_node(native, &mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, data);

        // Every node's cached size equals the size field in its header.
        let mut reader = BinaryReader::new(&bytes);
        for (id, _) in tree.iter_subtree(native) {
            let header = read_header(&mut reader).unwrap();
            let node = tree.get(id).unwrap();
            assert_eq!(header.id(), node.tag);
            assert_eq!({ header.size }, node.payload_size());
            if !node.body.is_container() {
                reader.read_bytes(header.size as usize).unwrap();
            }
        }
        assert!(reader.is_empty());
    }
}

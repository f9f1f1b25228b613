//! Chunk encoder.
//!
//! Sizes are never taken from the tree: each header is written as a
//! placeholder, the body and children follow, and the header is patched
//! with the measured length.

use rmdkit_common::BinaryWriter;

use crate::chunk::{patch_header, write_header_placeholder, ChunkHeader};
use crate::nodes::NodeBody;
use crate::tree::{Node, NodeId, NodeTree, MAX_NESTING_DEPTH};
use crate::{ChunkId, Error, Result};

/// Containers whose first child must be a struct.
const REQUIRES_STRUCT: &[ChunkId] = &[
    ChunkId::CLUMP,
    ChunkId::FRAME_LIST,
    ChunkId::GEOMETRY_LIST,
    ChunkId::GEOMETRY,
    ChunkId::MATERIAL,
    ChunkId::MATERIAL_LIST,
    ChunkId::TEXTURE,
    ChunkId::ATOMIC,
    ChunkId::TEXTURE_DICTIONARY,
    ChunkId::TEXTURE_NATIVE,
    ChunkId::WORLD,
    ChunkId::PLANE_SECTOR,
    ChunkId::ATOMIC_SECTOR,
];

impl NodeTree {
    /// Write `id` and its subtree.
    ///
    /// On success every written node's cached payload size equals the size
    /// in its header. Subtrees nested deeper than
    /// [`MAX_NESTING_DEPTH`] fail with [`Error::NestingTooDeep`].
    pub fn write_node(&self, id: NodeId, writer: &mut BinaryWriter) -> Result<()> {
        self.write_at(id, writer, 0)
    }

    fn write_at(&self, id: NodeId, writer: &mut BinaryWriter, depth: usize) -> Result<()> {
        let node = self.get(id)?;
        if depth >= MAX_NESTING_DEPTH {
            return Err(Error::NestingTooDeep {
                tag: node.tag,
                offset: writer.position(),
            });
        }
        self.check_node(id, node)?;

        let header_offset = write_header_placeholder(writer)?;
        let start = writer.position();

        node.body.write(writer, &self.schema_context(id))?;
        for &child in node.children() {
            self.write_at(child, writer, depth + 1)?;
        }

        let size = writer.position() - start;
        let size = u32::try_from(size).map_err(|_| Error::InvalidNode {
            tag: node.tag,
            reason: format!("payload of {} bytes does not fit a chunk header", size),
        })?;
        patch_header(writer, header_offset, ChunkHeader::new(node.tag, size, node.version))?;
        node.set_payload_size(size);
        Ok(())
    }

    /// Write `id` and its subtree into a new buffer.
    pub fn save_node(&self, id: NodeId) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.write_node(id, &mut writer)?;
        Ok(writer.into_inner())
    }

    /// Write several top-level nodes back to back.
    pub fn save_all(&self, roots: &[NodeId]) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        for &id in roots {
            self.write_node(id, &mut writer)?;
        }
        Ok(writer.into_inner())
    }

    /// Preconditions a node must meet before it can be written.
    fn check_node(&self, id: NodeId, node: &Node) -> Result<()> {
        let invalid = |reason: String| Error::InvalidNode {
            tag: node.tag,
            reason,
        };
        let missing = |expected: ChunkId| Error::MissingChild {
            parent: node.tag,
            expected,
        };

        if !node.body.is_container() {
            if !node.children().is_empty() {
                return Err(invalid(format!(
                    "{} payload cannot own {} children",
                    node.body.schema_name(),
                    node.children().len()
                )));
            }
            if let NodeBody::Skin(skin) = &node.body {
                let geometry = self.schema_context(id).geometry.ok_or_else(|| {
                    invalid("skin is not inside a geometry".to_string())
                })?;
                if skin.vertex_count() != geometry.vertex_count as usize {
                    return Err(invalid(format!(
                        "skin covers {} vertices but its geometry has {}",
                        skin.vertex_count(),
                        geometry.vertex_count
                    )));
                }
            }
            return Ok(());
        }

        if node.body == NodeBody::RasterStruct {
            return self.check_struct_sequence(node, &[is_raster_info, is_raster_data], "raster info then raster data");
        }

        if REQUIRES_STRUCT.contains(&node.tag) && self.struct_child(id).is_none() {
            return Err(missing(ChunkId::STRUCT));
        }

        match node.tag {
            ChunkId::TEXTURE_NATIVE => {
                self.check_struct_sequence(node, &[is_texture_struct, is_raster_struct], "texture struct then raster struct")?;
            }
            ChunkId::MATERIAL => {
                if let Some(NodeBody::MaterialStruct(m)) = self.struct_body(id) {
                    if m.is_textured() && self.child_with_tag(id, ChunkId::TEXTURE).is_none() {
                        return Err(missing(ChunkId::TEXTURE));
                    }
                }
            }
            ChunkId::MATERIAL_LIST => {
                if let Some(NodeBody::MaterialListStruct(list)) = self.struct_body(id) {
                    let defined = self.children_with_tag(id, ChunkId::MATERIAL).count();
                    if list.defined_count() != defined {
                        return Err(invalid(format!(
                            "list defines {} materials but holds {}",
                            list.defined_count(),
                            defined
                        )));
                    }
                }
            }
            ChunkId::GEOMETRY_LIST => {
                if let Some(NodeBody::GeometryListStruct(list)) = self.struct_body(id) {
                    let held = self.children_with_tag(id, ChunkId::GEOMETRY).count();
                    if list.geometry_count as usize != held {
                        return Err(invalid(format!(
                            "list declares {} geometries but holds {}",
                            list.geometry_count, held
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Check that the struct children of `node` match `expected` in order.
    fn check_struct_sequence(
        &self,
        node: &Node,
        expected: &[fn(&NodeBody) -> bool],
        description: &str,
    ) -> Result<()> {
        let structs: Vec<&NodeBody> = node
            .children()
            .iter()
            .filter_map(|&c| self.node(c))
            .filter(|c| c.tag == ChunkId::STRUCT)
            .map(|c| &c.body)
            .collect();

        if structs.len() < expected.len() {
            return Err(Error::MissingChild {
                parent: node.tag,
                expected: ChunkId::STRUCT,
            });
        }
        if structs.len() > expected.len() || !structs.iter().zip(expected).all(|(body, is)| is(body)) {
            return Err(Error::InvalidNode {
                tag: node.tag,
                reason: format!("struct children must be {}", description),
            });
        }
        Ok(())
    }
}

fn is_texture_struct(body: &NodeBody) -> bool {
    matches!(body, NodeBody::TextureStruct(_))
}

fn is_raster_struct(body: &NodeBody) -> bool {
    matches!(body, NodeBody::RasterStruct)
}

fn is_raster_info(body: &NodeBody) -> bool {
    matches!(body, NodeBody::RasterInfo(_))
}

fn is_raster_data(body: &NodeBody) -> bool {
    matches!(body, NodeBody::RasterData(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::read_header;
    use crate::nodes::{
        GeometryListStruct, GeometryStruct, MaterialListStruct, MaterialStruct, SkinPlugin,
        TextureStruct,
    };
    use rmdkit_common::BinaryReader;

    #[test]
    fn test_header_size_is_patched() {
        let mut tree = NodeTree::new();
        let ext = tree.add(ChunkId::EXTENSION, NodeBody::Container);
        let s = tree
            .add_child(ext, ChunkId::STRING, NodeBody::String("frame_01".into()))
            .unwrap();

        let bytes = tree.save_node(ext).unwrap();
        let mut reader = BinaryReader::new(&bytes);
        let header = read_header(&mut reader).unwrap();
        assert_eq!(header.size as usize, bytes.len() - ChunkHeader::SIZE);
        assert_eq!(tree.get(ext).unwrap().payload_size(), { header.size });

        let inner = read_header(&mut reader).unwrap();
        assert_eq!(inner.size as usize, reader.remaining());
        assert_eq!(inner.size % 4, 0);
        assert_eq!(tree.get(s).unwrap().payload_size(), { inner.size });
    }

    #[test]
    fn test_material_textured_without_texture() {
        let mut tree = NodeTree::new();
        let material = tree.add(ChunkId::MATERIAL, NodeBody::Container);
        let body = MaterialStruct {
            textured: 1,
            ..MaterialStruct::default()
        };
        tree.add_child(material, ChunkId::STRUCT, NodeBody::MaterialStruct(body))
            .unwrap();

        assert!(matches!(
            tree.save_node(material),
            Err(Error::MissingChild {
                parent: ChunkId::MATERIAL,
                expected: ChunkId::TEXTURE
            })
        ));
    }

    #[test]
    fn test_container_without_struct() {
        let mut tree = NodeTree::new();
        let clump = tree.add(ChunkId::CLUMP, NodeBody::Container);
        assert!(matches!(
            tree.save_node(clump),
            Err(Error::MissingChild {
                expected: ChunkId::STRUCT,
                ..
            })
        ));
    }

    #[test]
    fn test_material_list_count_mismatch() {
        let mut tree = NodeTree::new();
        let list = tree.add(ChunkId::MATERIAL_LIST, NodeBody::Container);
        let body = MaterialListStruct {
            indices: vec![-1, -1],
        };
        tree.add_child(list, ChunkId::STRUCT, NodeBody::MaterialListStruct(body))
            .unwrap();
        let material = tree.add_child(list, ChunkId::MATERIAL, NodeBody::Container).unwrap();
        tree.add_child(material, ChunkId::STRUCT, NodeBody::MaterialStruct(MaterialStruct::default()))
            .unwrap();

        assert!(matches!(tree.save_node(list), Err(Error::InvalidNode { .. })));
    }

    #[test]
    fn test_geometry_list_count_mismatch() {
        let mut tree = NodeTree::new();
        let list = tree.add(ChunkId::GEOMETRY_LIST, NodeBody::Container);
        tree.add_child(
            list,
            ChunkId::STRUCT,
            NodeBody::GeometryListStruct(GeometryListStruct { geometry_count: 1 }),
        )
        .unwrap();
        assert!(matches!(tree.save_node(list), Err(Error::InvalidNode { .. })));
    }

    #[test]
    fn test_texture_native_requires_raster() {
        let mut tree = NodeTree::new();
        let native = tree.add(ChunkId::TEXTURE_NATIVE, NodeBody::Container);
        tree.add_child(native, ChunkId::STRUCT, NodeBody::TextureStruct(TextureStruct::default()))
            .unwrap();
        assert!(matches!(
            tree.save_node(native),
            Err(Error::MissingChild {
                parent: ChunkId::TEXTURE_NATIVE,
                expected: ChunkId::STRUCT
            })
        ));
    }

    #[test]
    fn test_leaf_with_children() {
        let mut tree = NodeTree::new();
        let s = tree.add(ChunkId::STRING, NodeBody::String("x".into()));
        let other = tree.add(ChunkId::EXTENSION, NodeBody::Container);
        tree.attach_child(s, other).unwrap();
        assert!(matches!(tree.save_node(s), Err(Error::InvalidNode { .. })));
    }

    #[test]
    fn test_skin_vertex_count_must_match_geometry() {
        let mut tree = NodeTree::new();
        let geometry = tree.add(ChunkId::GEOMETRY, NodeBody::Container);
        let body = GeometryStruct {
            vertex_count: 3,
            ..GeometryStruct::default()
        };
        tree.add_child(geometry, ChunkId::STRUCT, NodeBody::GeometryStruct(body))
            .unwrap();
        let ext = tree.add_child(geometry, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        let skin = SkinPlugin {
            bone_indices: vec![[0; 4]; 2],
            weights: vec![[1.0, 0.0, 0.0, 0.0]; 2],
            ..SkinPlugin::default()
        };
        let skin = tree.add_child(ext, ChunkId::SKIN, NodeBody::Skin(skin)).unwrap();

        assert!(matches!(
            tree.save_node(skin),
            Err(Error::InvalidNode {
                tag: ChunkId::SKIN,
                ..
            })
        ));
    }

    #[test]
    fn test_deep_subtree_is_not_written() {
        let mut tree = NodeTree::new();
        let root = tree.add(ChunkId::EXTENSION, NodeBody::Container);
        let mut leaf = root;
        for _ in 0..MAX_NESTING_DEPTH {
            leaf = tree.add_child(leaf, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        }

        let err = tree.save_node(root).unwrap_err();
        assert!(matches!(
            err,
            Error::NestingTooDeep { tag: ChunkId::EXTENSION, offset }
                if offset == MAX_NESTING_DEPTH * ChunkHeader::SIZE
        ));

        // One level up fits.
        let child = tree.children(root)[0];
        assert_eq!(
            tree.save_node(child).unwrap().len(),
            MAX_NESTING_DEPTH * ChunkHeader::SIZE
        );
    }
}

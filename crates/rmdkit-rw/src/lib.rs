//! RenderWare chunk codec.
//!
//! RenderWare streams are trees of chunks. Each chunk is a 12-byte header
//! (tag, payload size, version) followed by its payload, which for container
//! chunks is simply a run of child chunks. This crate decodes such streams
//! into a [`NodeTree`] of typed [`NodeBody`] payloads and writes them back,
//! byte for byte.
//!
//! # Struct chunks
//!
//! The generic struct chunk (`0x01`) does not describe its own layout. Its
//! schema is resolved from the enclosing container, and under texture natives
//! from its position: the first struct is the texture struct, the second the
//! raster struct, whose own two structs are the raster info and the raster
//! data.
//!
//! # Unknown chunks
//!
//! Chunks with an unknown tag are kept as [`NodeBody::Opaque`] and written
//! back unchanged.
//!
//! # Example
//!
//! ```no_run
//! use rmdkit_rw::{ChunkId, NodeTree};
//!
//! let data = std::fs::read("model.dff")?;
//! let (tree, roots) = NodeTree::parse(&data)?;
//!
//! for &root in &roots {
//!     for (id, depth) in tree.iter_subtree(root) {
//!         let node = tree.get(id)?;
//!         println!("{:indent$}{} ({} bytes)", "", node.tag, node.payload_size(), indent = depth * 2);
//!     }
//! }
//!
//! let bytes = tree.save_all(&roots)?;
//! assert_eq!(bytes, data);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod chunk;
mod decode;
mod encode;
mod error;
mod hierarchy;
pub mod nodes;
mod tree;

pub use chunk::{
    patch_header, peek_header, read_header, unpack_library_version, version_for_tag,
    write_header_placeholder, ChunkHeader, ChunkId, RMD_TAG_BOUNDARY, RMD_VERSION, RW_VERSION,
};
pub use error::{Error, Result};
pub use hierarchy::{Bone, FrameHierarchy};
pub use nodes::NodeBody;
pub use tree::{Node, NodeId, NodeRef, NodeTree, SubtreeIter, MAX_NESTING_DEPTH};

pub use rmdkit_common::{BinaryReader, BinaryWriter};

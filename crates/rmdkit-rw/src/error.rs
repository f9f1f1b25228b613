//! Error types for chunk decoding and encoding.

use thiserror::Error;

use crate::{ChunkId, NodeId};

/// Errors that can occur when decoding or encoding a node tree.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary cursor error (out of data, unencodable string).
    #[error("{0}")]
    Common(#[from] rmdkit_common::Error),

    /// A chunk declares more payload than its container has left.
    #[error("{tag} chunk at {offset:#x} declares {declared} bytes but only {available} remain")]
    Truncated {
        tag: ChunkId,
        offset: usize,
        declared: u32,
        available: usize,
    },

    /// A chunk body did not span exactly its declared size.
    #[error("{tag} chunk at {offset:#x} declares {declared} bytes but its body spans {consumed}")]
    SizeMismatch {
        tag: ChunkId,
        offset: usize,
        declared: u32,
        consumed: usize,
    },

    /// No rule resolves the schema of a struct chunk in this position.
    #[error("cannot resolve struct chunk at {offset:#x} under {parent} (grandparent {grandparent:?})")]
    AmbiguousStruct {
        offset: usize,
        parent: ChunkId,
        grandparent: Option<ChunkId>,
    },

    /// Containers nest deeper than [`MAX_NESTING_DEPTH`](crate::MAX_NESTING_DEPTH).
    #[error("{tag} chunk at {offset:#x} nests deeper than {max} levels", max = crate::MAX_NESTING_DEPTH)]
    NestingTooDeep { tag: ChunkId, offset: usize },

    /// Bytes left over after a single-node load.
    #[error("{remaining} trailing bytes after node at {offset:#x}")]
    TrailingData { offset: usize, remaining: usize },

    /// A node required by the format is absent.
    #[error("{parent} node is missing its required {expected} child")]
    MissingChild { parent: ChunkId, expected: ChunkId },

    /// A node's contents contradict its siblings or schema.
    #[error("invalid {tag} node: {reason}")]
    InvalidNode { tag: ChunkId, reason: String },

    /// A node id that does not belong to this tree.
    #[error("node {0:?} does not exist in this tree")]
    UnknownNode(NodeId),

    /// Attaching would make a node its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    CyclicAttachment { parent: NodeId, child: NodeId },
}

impl Error {
    /// Whether this error reports a truncated or structurally malformed
    /// stream, as opposed to misuse of the tree API.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. }
                | Error::SizeMismatch { .. }
                | Error::AmbiguousStruct { .. }
                | Error::NestingTooDeep { .. }
                | Error::TrailingData { .. }
                | Error::Common(rmdkit_common::Error::UnexpectedEof { .. })
        )
    }
}

/// Result type for node tree operations.
pub type Result<T> = std::result::Result<T, Error>;

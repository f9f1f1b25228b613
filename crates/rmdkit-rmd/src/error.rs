//! Error types for RMD scenes.

use rmdkit_rw::ChunkId;
use thiserror::Error;

/// Errors that can occur when loading or saving a scene.
#[derive(Debug, Error)]
pub enum Error {
    /// Chunk codec error.
    #[error("{0}")]
    Rw(#[from] rmdkit_rw::Error),

    /// A sub-node load was given a chunk of the wrong kind.
    #[error("expected {expected} chunk, found {actual}")]
    UnexpectedNode {
        expected: &'static str,
        actual: ChunkId,
    },

    /// Chunks follow the terminator of a single animation set.
    #[error("{count} chunks follow the animation set terminator")]
    TrailingNodes { count: usize },

    /// No such part of the scene.
    #[error("{kind} index {index} out of range (scene has {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
}

impl Error {
    /// Whether the underlying stream is truncated or malformed.
    pub fn is_malformed(&self) -> bool {
        match self {
            Error::Rw(e) => e.is_malformed(),
            Error::TrailingNodes { .. } => true,
            _ => false,
        }
    }
}

impl From<rmdkit_common::Error> for Error {
    fn from(e: rmdkit_common::Error) -> Self {
        Error::Rw(e.into())
    }
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for rmdkit-common.

use thiserror::Error;

/// Common error type for rmdkit binary I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset {offset:#x}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// String cannot be encoded as a RenderWare string.
    #[error("string {0:?} cannot be encoded: only non-NUL single-byte characters are allowed")]
    InvalidString(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

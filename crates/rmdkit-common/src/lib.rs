//! Common utilities for rmdkit.
//!
//! This crate provides the binary cursor layer shared by the chunk codec:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`BinaryWriter`] - Seekable little-endian writing with back-patching
//! - RenderWare string encoding rules ([`rw_string_padding`])

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use writer::{rw_string_padding, BinaryWriter};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

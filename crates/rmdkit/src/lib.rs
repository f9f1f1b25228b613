//! rmdkit - RMD scene and RenderWare chunk toolkit.
//!
//! This crate provides a unified interface to the rmdkit library crates.
//!
//! # Crates
//!
//! - [`rmdkit_common`] - Binary reading and writing
//! - [`rmdkit_rw`] - RenderWare chunk tree codec, node schemas, frame hierarchies
//! - [`rmdkit_rmd`] - RMD scene reconstruction and canonical writing
//!
//! # Example
//!
//! ```no_run
//! use rmdkit::prelude::*;
//!
//! let data = std::fs::read("model.rmd")?;
//! let scene = Scene::load(&data)?;
//!
//! for &clump in scene.clumps() {
//!     let frames = scene.tree().child_with_tag(clump, ChunkId::FRAME_LIST);
//!     if let Some(frames) = frames {
//!         let hierarchy = FrameHierarchy::new(scene.tree(), frames)?;
//!         println!("clump with {} frames", hierarchy.len());
//!     }
//! }
//!
//! assert_eq!(scene.save()?, data);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use rmdkit_common as common;
pub use rmdkit_rmd as rmd;
pub use rmdkit_rw as rw;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use rmdkit_common::{BinaryReader, BinaryWriter};
    pub use rmdkit_rmd::{AnimationSet, Scene};
    pub use rmdkit_rw::{ChunkId, FrameHierarchy, NodeBody, NodeId, NodeTree};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

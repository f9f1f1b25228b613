//! RMD scene container.
//!
//! RMD files wrap RenderWare chunks in a flat run of top-level chunks: an
//! optional texture dictionary, clumps, a node-link list attaching frames
//! to one another, and animation sets delimited by terminator chunks.
//! [`Scene`] sorts such a run into those parts and writes it back in a
//! canonical order.
//!
//! # Example
//!
//! ```no_run
//! use rmdkit_rmd::Scene;
//!
//! let data = std::fs::read("model.rmd")?;
//! let scene = Scene::load(&data)?;
//! println!("{} clumps, {} animation sets", scene.clumps().len(), scene.animation_sets().len());
//!
//! // Export the first clump on its own.
//! let clump = scene.save_clump(0)?;
//! std::fs::write("clump.dff", clump)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod animation;
mod error;
mod scene;

pub use animation::{is_animation_set_member, AnimationSet, ANIMATION_SET_MEMBERS};
pub use error::{Error, Result};
pub use scene::Scene;

//! Digest rendering and persistence.
//!
//! - [`render`] - Turns a feed's selected articles into one HTML document
//! - [`writer`] - Saves each document under a name derived from the feed title

pub mod render;
pub mod writer;

pub use render::{render_digest, render_fragment};
pub use writer::{ArtifactWriter, WriteError};

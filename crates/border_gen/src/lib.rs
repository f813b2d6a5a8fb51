//! Country silhouette generator.
//!
//! Turns the entries of an asset tree (`<root>/<category>/<name>.<ext>`) into
//! orthographic map images of the matching country, continent or world,
//! overwriting each placeholder in place. See [`batch::BatchDriver`].

pub mod batch;
pub mod canvas;
pub mod codec;
pub mod config;
pub mod convert;
pub mod pipeline;
pub mod render;

pub use batch::{BatchDriver, BatchResult, Failure};
pub use codec::NameCodec;
pub use pipeline::{Pipeline, PipelineOptions};
pub use render::{RenderError, Renderer};

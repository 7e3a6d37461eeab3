//! Source nodes for podprint pipelines.
//!
//! A source is a graph root: it takes no upstream streams and yields lazy
//! `(tag, packet)` rows. [`GlobSource`] produces one row per file matching a
//! glob pattern, and fingerprints itself through the core object hasher.

pub mod glob;
pub mod source;
pub mod stream;
pub mod tag;

pub use glob::{GlobSource, GlobSourceBuilder};
pub use source::{Keys, Source, infer_keys};
pub use stream::{Row, Stream};
pub use tag::{TagFunction, default_tag_function, default_tag_function_info};

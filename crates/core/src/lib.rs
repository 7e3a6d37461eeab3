//! Core hashing and identity types for podprint.
//!
//! This crate provides:
//! - Fixed-size digests and the canonical type-tagged encoding
//! - Function identity extraction under name, signature or content modes
//! - String caches (in-memory LRU and SQLite) with per-key `get_or_compute`
//! - Chunked file hashing, cached and composite variants
//! - Semantic hashing of columnar tables
//! - Identity structures and the object hasher
//! - Configuration structures and the default hasher factory

mod canonical;

pub mod cache;
pub mod config;
pub mod defaults;
pub mod digest;
pub mod error;
pub mod file;
pub mod function;
pub mod object;
pub mod table;
pub mod types;

pub use cache::{InMemoryCacher, SqliteCacher, StringCacher};
pub use config::{CacheBackend, ConfigError, HashingConfig};
pub use defaults::Hashers;
pub use digest::Digest;
pub use error::Error;
pub use file::{BasicFileHasher, CachedFileHasher, CompositeFileHasher, FileHasher};
pub use function::{ExtractOptions, FunctionInfo, FunctionInfoExtractor, HashMode};
pub use object::{ContentIdentifiable, IdentityStructure, ObjectHasher};
pub use table::{MissingPolicy, RecordTable, SemanticTableHasher, Table, Value};
pub use types::{Packet, PathSet, Tag};

//! String caches memoizing intermediate hash results.
//!
//! This module provides the [`StringCacher`] contract and two backends:
//!
//! - [`InMemoryCacher`]: unbounded, or bounded with least-recently-used eviction
//! - [`SqliteCacher`]: persistent across processes, same capacity policy
//!
//! Both serialize `get_or_compute` per key, so concurrent requests for one key
//! compute at most once while unrelated keys proceed independently.

pub mod locks;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use crate::Error;

pub use locks::KeyLocks;
pub use memory::InMemoryCacher;
pub use sqlite::SqliteCacher;

/// Key-value store of previously computed strings.
pub trait StringCacher: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    fn clear(&self) -> Result<(), Error>;

    fn len(&self) -> Result<usize, Error>;

    fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Lock table used to serialize [`get_or_compute`](StringCacher::get_or_compute).
    fn key_locks(&self) -> &KeyLocks;

    /// Return the cached value for `key`, or run `compute`, store and return its result.
    ///
    /// Concurrent calls for the same key run `compute` at most once. A failing
    /// `compute` stores nothing and its error is returned unchanged.
    fn get_or_compute(&self, key: &str, compute: &mut dyn FnMut() -> Result<String, Error>) -> Result<String, Error> {
        if let Some(value) = self.get(key)? {
            tracing::debug!(key, "cache hit");
            return Ok(value);
        }

        self.key_locks().with_key(key, || {
            if let Some(value) = self.get(key)? {
                tracing::debug!(key, "cache hit after wait");
                return Ok(value);
            }
            tracing::debug!(key, "cache miss");
            let value = compute()?;
            self.set(key, &value)?;
            Ok(value)
        })
    }
}

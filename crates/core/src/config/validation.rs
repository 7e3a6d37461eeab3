//! Configuration validation rules.
//!
//! This module provides validation logic for `HashingConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{CacheBackend, HashingConfig};
use crate::digest::DIGEST_LEN;
use thiserror::Error;

/// Largest accepted file read buffer (64MB).
const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl HashingConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `chunk_size` is 0 or exceeds 64MB
    /// - `table_chunk_size` is 0
    /// - `cache_max_size` is 0
    /// - `char_count` is 0 or longer than a hex digest
    /// - the `sqlite` backend has no `cache_db_path`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid { field: "chunk_size".into(), reason: "must be greater than 0".into() });
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid { field: "chunk_size".into(), reason: "must not exceed 64MB".into() });
        }

        if self.table_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "table_chunk_size".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.cache_max_size == Some(0) {
            return Err(ConfigError::Invalid {
                field: "cache_max_size".into(),
                reason: "must be greater than 0, or unset for an unbounded cache".into(),
            });
        }

        if let Some(chars) = self.char_count
            && (chars == 0 || chars > DIGEST_LEN * 2)
        {
            return Err(ConfigError::Invalid {
                field: "char_count".into(),
                reason: format!("must be between 1 and {}", DIGEST_LEN * 2),
            });
        }

        if self.cache_backend == CacheBackend::Sqlite && self.cache_db_path.is_none() {
            return Err(ConfigError::Invalid {
                field: "cache_db_path".into(),
                reason: "required when cache_backend is sqlite".into(),
            });
        }

        if self.cache_backend == CacheBackend::Memory && self.cache_db_path.is_some() {
            tracing::warn!("cache_db_path is set but cache_backend is memory; the path is ignored");
        }

        Ok(())
    }
}

//! Hashing configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PODPRINT_*)
//! 2. TOML config file (if PODPRINT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::file::DEFAULT_BUFFER_SIZE;
use crate::function::HashMode;
use crate::object::DEFAULT_CHAR_COUNT;
use crate::table::{DEFAULT_CHUNK_SIZE, MissingPolicy};

mod validation;

pub use validation::ConfigError;

/// Where cached file digests live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Hashing configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PODPRINT_*)
/// 2. TOML config file (if PODPRINT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Read buffer for file hashing, in bytes.
    ///
    /// Set via PODPRINT_CHUNK_SIZE environment variable.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Rows read per chunk when hashing tables.
    ///
    /// Set via PODPRINT_TABLE_CHUNK_SIZE environment variable.
    #[serde(default = "default_table_chunk_size")]
    pub table_chunk_size: usize,

    /// Null-cell policy for table hashing: `error` or `sentinel`.
    ///
    /// Set via PODPRINT_HANDLE_MISSING environment variable.
    #[serde(default)]
    pub handle_missing: MissingPolicy,

    /// Mode for embedded functions that do not declare one.
    ///
    /// Set via PODPRINT_FUNCTION_HASH_MODE environment variable.
    #[serde(default = "default_function_hash_mode")]
    pub function_hash_mode: HashMode,

    /// Length of string-form object digests; unset keeps all 64 characters.
    ///
    /// Set via PODPRINT_CHAR_COUNT environment variable.
    #[serde(default = "default_char_count")]
    pub char_count: Option<usize>,

    /// Maximum cached entries; unset means unbounded.
    ///
    /// Set via PODPRINT_CACHE_MAX_SIZE environment variable.
    #[serde(default)]
    pub cache_max_size: Option<usize>,

    /// Cache backend: `memory` or `sqlite`.
    ///
    /// Set via PODPRINT_CACHE_BACKEND environment variable.
    #[serde(default)]
    pub cache_backend: CacheBackend,

    /// Database path, required by the `sqlite` backend.
    ///
    /// Set via PODPRINT_CACHE_DB_PATH environment variable.
    #[serde(default)]
    pub cache_db_path: Option<PathBuf>,

    /// Fold absolute path and size into file digests.
    ///
    /// Set via PODPRINT_PATH_SENSITIVE environment variable.
    #[serde(default)]
    pub path_sensitive: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_table_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_function_hash_mode() -> HashMode {
    HashMode::Signature
}

fn default_char_count() -> Option<usize> {
    Some(DEFAULT_CHAR_COUNT)
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            table_chunk_size: default_table_chunk_size(),
            handle_missing: MissingPolicy::Error,
            function_hash_mode: default_function_hash_mode(),
            char_count: default_char_count(),
            cache_max_size: None,
            cache_backend: CacheBackend::Memory,
            cache_db_path: None,
            path_sensitive: false,
        }
    }
}

impl HashingConfig {
    /// The layered figment without extracting it.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PODPRINT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("PODPRINT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Extract and validate from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = HashingConfig::default();
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.table_chunk_size, 8192);
        assert_eq!(config.handle_missing, MissingPolicy::Error);
        assert_eq!(config.function_hash_mode, HashMode::Signature);
        assert_eq!(config.char_count, Some(32));
        assert!(config.cache_max_size.is_none());
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert!(!config.path_sensitive);
    }

    #[test]
    fn test_load_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("PODPRINT_CHUNK_SIZE", "4096");
            jail.set_env("PODPRINT_HANDLE_MISSING", "sentinel");
            jail.set_env("PODPRINT_CACHE_MAX_SIZE", "100");
            jail.set_env("PODPRINT_FUNCTION_HASH_MODE", "content");

            let config = HashingConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.chunk_size, 4096);
            assert_eq!(config.handle_missing, MissingPolicy::Sentinel);
            assert_eq!(config.cache_max_size, Some(100));
            assert_eq!(config.function_hash_mode, HashMode::Content);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "podprint.toml",
                r#"
                    chunk_size = 1024
                    cache_backend = "sqlite"
                    cache_db_path = "cache.sqlite"
                "#,
            )?;
            jail.set_env("PODPRINT_CONFIG_FILE", "podprint.toml");
            jail.set_env("PODPRINT_CHUNK_SIZE", "2048");

            let config = HashingConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.chunk_size, 2048);
            assert_eq!(config.cache_backend, CacheBackend::Sqlite);
            assert_eq!(config.cache_db_path, Some(PathBuf::from("cache.sqlite")));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid() {
        Jail::expect_with(|jail| {
            jail.set_env("PODPRINT_CHUNK_SIZE", "0");
            assert!(matches!(HashingConfig::load(), Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}

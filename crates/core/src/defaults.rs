//! Default hasher construction from a [`HashingConfig`].
//!
//! Build one [`Hashers`] at startup and pass it by reference to whatever needs
//! hashing. All hashers it hands out share its cacher.

use std::sync::Arc;

use crate::Error;
use crate::cache::{InMemoryCacher, SqliteCacher, StringCacher};
use crate::config::{CacheBackend, HashingConfig};
use crate::file::CompositeFileHasher;
use crate::function::FunctionInfoExtractor;
use crate::object::ObjectHasher;
use crate::table::{PATH_SEMANTIC_TYPE, PathHasher, SemanticTableHasher};

/// Factory for the default file, object and table hashers.
#[derive(Clone)]
pub struct Hashers {
    config: HashingConfig,
    cacher: Arc<dyn StringCacher>,
}

impl Hashers {
    /// Build the cacher selected by `config.cache_backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sqlite backend cannot be opened or migrated,
    /// or if it is selected without `cache_db_path`.
    pub fn from_config(config: &HashingConfig) -> Result<Self, Error> {
        let cacher: Arc<dyn StringCacher> = match config.cache_backend {
            CacheBackend::Memory => Arc::new(InMemoryCacher::new(config.cache_max_size)),
            CacheBackend::Sqlite => {
                let path = config.cache_db_path.as_ref().ok_or_else(|| {
                    Error::InvalidArgument("cache_db_path is required for the sqlite cache backend".into())
                })?;
                Arc::new(SqliteCacher::open(path, config.cache_max_size)?)
            }
        };
        tracing::debug!(backend = ?config.cache_backend, max_size = ?config.cache_max_size, "initialized hash cache");
        Ok(Self::with_cacher(config.clone(), cacher))
    }

    /// Use an injected cacher instead of the configured backend.
    pub fn with_cacher(config: HashingConfig, cacher: Arc<dyn StringCacher>) -> Self {
        Self { config, cacher }
    }

    pub fn config(&self) -> &HashingConfig {
        &self.config
    }

    pub fn cacher(&self) -> Arc<dyn StringCacher> {
        Arc::clone(&self.cacher)
    }

    /// Composite file hasher, memoized through the shared cacher when `with_cache`.
    pub fn composite_file_hasher(&self, with_cache: bool) -> CompositeFileHasher {
        let hasher = if with_cache {
            CompositeFileHasher::cached(self.config.chunk_size, self.cacher())
        } else {
            CompositeFileHasher::basic(self.config.chunk_size)
        };
        hasher.path_sensitive(self.config.path_sensitive)
    }

    pub fn object_hasher(&self) -> ObjectHasher {
        ObjectHasher::new(FunctionInfoExtractor::new(self.config.function_hash_mode), self.config.char_count)
    }

    /// Table hasher with `Path` columns hashed by cached file content.
    pub fn table_hasher(&self) -> SemanticTableHasher {
        let mut hasher = SemanticTableHasher::new(self.config.table_chunk_size, self.config.handle_missing);
        let content = self.composite_file_hasher(true).content_hasher();
        hasher.register_semantic_hasher(PATH_SEMANTIC_TYPE, Arc::new(PathHasher::new(content)));
        hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileHasher;
    use crate::function::{ExtractOptions, FunctionInfo, HashMode};
    use crate::object::IdentityStructure;
    use crate::table::{ColumnSchema, DataType, RecordTable, Value};
    use std::fs;

    #[test]
    fn test_default_hashers() {
        let hashers = Hashers::from_config(&HashingConfig::default()).unwrap();
        assert!(hashers.table_hasher().registry().contains(PATH_SEMANTIC_TYPE));
        assert_eq!(hashers.object_hasher().extractor().default_mode(), HashMode::Signature);
    }

    #[test]
    fn test_cached_file_hasher_shares_cacher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"content").unwrap();

        let hashers = Hashers::from_config(&HashingConfig::default()).unwrap();
        let cached = hashers.composite_file_hasher(true).hash_file(&path).unwrap();
        let uncached = hashers.composite_file_hasher(false).hash_file(&path).unwrap();
        assert_eq!(cached, uncached);
        assert_eq!(hashers.cacher().len().unwrap(), 1);
    }

    #[test]
    fn test_table_hasher_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"content").unwrap();

        let hashers = Hashers::from_config(&HashingConfig::default()).unwrap();
        let table = RecordTable::builder()
            .column(
                ColumnSchema::new("file", DataType::Str).with_semantic_type(PATH_SEMANTIC_TYPE),
                vec![Value::from(path.to_string_lossy().into_owned())],
            )
            .build()
            .unwrap();
        hashers.table_hasher().hash_table(&table).unwrap();
        assert_eq!(hashers.cacher().len().unwrap(), 1);
    }

    #[test]
    fn test_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = HashingConfig {
            cache_backend: CacheBackend::Sqlite,
            cache_db_path: Some(dir.path().join("cache.sqlite")),
            ..Default::default()
        };
        let hashers = Hashers::from_config(&config).unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"content").unwrap();
        hashers.composite_file_hasher(true).hash_file(&path).unwrap();
        assert_eq!(hashers.cacher().len().unwrap(), 1);
    }

    #[test]
    fn test_configured_default_mode_applies() {
        let config = HashingConfig { function_hash_mode: HashMode::Name, ..Default::default() };
        let hasher = Hashers::from_config(&config).unwrap().object_hasher();
        let f1 = IdentityStructure::Function {
            info: FunctionInfo::named("f", "m").param("x", "i64"),
            mode: None,
            options: ExtractOptions::default(),
        };
        let f2 = IdentityStructure::Function {
            info: FunctionInfo::named("f", "m").param("y", "String"),
            mode: None,
            options: ExtractOptions::default(),
        };
        assert_eq!(hasher.hash_structure(&f1).unwrap(), hasher.hash_structure(&f2).unwrap());
    }
}

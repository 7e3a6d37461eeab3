//! Semantic hashing of columnar tables.
//!
//! Columns are hashed in declared order, rows in row order. A column whose
//! semantic type has a registered [`SemanticHasher`] contributes the digests
//! that hasher produces instead of its raw values, so a `Path` column is
//! fingerprinted by the content of the files it points at. Tables are read
//! `chunk_size` rows at a time; chunk boundaries never reach the hash state,
//! so the digest does not depend on the chunk size.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::canonical::{self, Sink};
use crate::digest::{Digest, DigestWriter};
use crate::file::FileHasher;

/// Default number of rows read per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Semantic type tag for columns holding file paths.
pub const PATH_SEMANTIC_TYPE: &str = "Path";

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int,
    Float,
    Str,
    Bytes,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Str => "str",
            DataType::Bytes => "bytes",
        }
    }
}

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `None` for nulls, which fit any column.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::Str(_) => Some(DataType::Str),
            Value::Bytes(_) => Some(DataType::Bytes),
        }
    }

    fn write_canonical(&self, sink: &mut impl Sink) {
        match self {
            Value::Null => canonical::write_tag(sink, canonical::TAG_NULL),
            Value::Bool(v) => canonical::write_bool(sink, *v),
            Value::Int(v) => canonical::write_int(sink, *v),
            Value::Float(v) => canonical::write_float(sink, *v),
            Value::Str(v) => canonical::write_str(sink, v),
            Value::Bytes(v) => canonical::write_bytes(sink, v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Declared name, storage type and optional semantic type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub semantic_type: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type, semantic_type: None }
    }

    pub fn with_semantic_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.semantic_type = Some(semantic_type.into());
        self
    }
}

/// Columnar data readable in row chunks.
pub trait Table {
    fn columns(&self) -> &[ColumnSchema];

    fn num_rows(&self) -> usize;

    /// Values of `column` for rows `offset..offset + len`.
    fn chunk(&self, column: usize, offset: usize, len: usize) -> Result<Vec<Value>, Error>;
}

/// In-memory columnar table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    schema: Vec<ColumnSchema>,
    columns: Vec<Vec<Value>>,
}

impl RecordTable {
    pub fn builder() -> RecordTableBuilder {
        RecordTableBuilder::default()
    }
}

impl Table for RecordTable {
    fn columns(&self) -> &[ColumnSchema] {
        &self.schema
    }

    fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    fn chunk(&self, column: usize, offset: usize, len: usize) -> Result<Vec<Value>, Error> {
        let values = self
            .columns
            .get(column)
            .ok_or_else(|| Error::InvalidArgument(format!("column index {column} out of range")))?;
        let end = offset.saturating_add(len).min(values.len());
        Ok(values.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default())
    }
}

/// Builder validating column lengths and value types.
#[derive(Debug, Default)]
pub struct RecordTableBuilder {
    schema: Vec<ColumnSchema>,
    columns: Vec<Vec<Value>>,
}

impl RecordTableBuilder {
    pub fn column(mut self, schema: ColumnSchema, values: Vec<Value>) -> Self {
        self.schema.push(schema);
        self.columns.push(values);
        self
    }

    /// # Errors
    ///
    /// `InvalidArgument` on duplicate column names, ragged columns, or a value
    /// whose type differs from its column's declared type.
    pub fn build(self) -> Result<RecordTable, Error> {
        let rows = self.columns.first().map_or(0, Vec::len);
        for (i, (schema, values)) in self.schema.iter().zip(&self.columns).enumerate() {
            if self.schema[..i].iter().any(|s| s.name == schema.name) {
                return Err(Error::InvalidArgument(format!("duplicate column '{}'", schema.name)));
            }
            if values.len() != rows {
                return Err(Error::InvalidArgument(format!(
                    "column '{}' has {} rows, expected {rows}",
                    schema.name,
                    values.len()
                )));
            }
            if let Some((row, value)) =
                values.iter().enumerate().find(|(_, v)| v.data_type().is_some_and(|t| t != schema.data_type))
            {
                return Err(Error::InvalidArgument(format!(
                    "column '{}' is {} but row {row} holds {value:?}",
                    schema.name,
                    schema.data_type.as_str()
                )));
            }
        }
        Ok(RecordTable { schema: self.schema, columns: self.columns })
    }
}

/// Specialized hashing for values of one semantic type.
pub trait SemanticHasher: Send + Sync {
    fn hash_value(&self, value: &Value) -> Result<Digest, Error>;
}

/// Hashes a path-valued cell by the content of the file it names.
pub struct PathHasher {
    file_hasher: Arc<dyn FileHasher>,
}

impl PathHasher {
    pub fn new(file_hasher: Arc<dyn FileHasher>) -> Self {
        Self { file_hasher }
    }
}

impl SemanticHasher for PathHasher {
    fn hash_value(&self, value: &Value) -> Result<Digest, Error> {
        match value {
            Value::Str(path) => self.file_hasher.hash_file(Path::new(path)),
            other => Err(Error::InvalidArgument(format!("path column holds a non-string value {other:?}"))),
        }
    }
}

/// Semantic type tag to hasher. At most one hasher per tag.
#[derive(Clone, Default)]
pub struct SemanticHasherRegistry {
    hashers: BTreeMap<String, Arc<dyn SemanticHasher>>,
}

impl SemanticHasherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hasher` for `semantic_type`, returning the one it replaces.
    pub fn register(
        &mut self, semantic_type: impl Into<String>, hasher: Arc<dyn SemanticHasher>,
    ) -> Option<Arc<dyn SemanticHasher>> {
        let semantic_type = semantic_type.into();
        let previous = self.hashers.insert(semantic_type.clone(), hasher);
        if previous.is_some() {
            tracing::warn!(semantic_type, "replaced registered semantic hasher");
        }
        previous
    }

    pub fn get(&self, semantic_type: &str) -> Option<&Arc<dyn SemanticHasher>> {
        self.hashers.get(semantic_type)
    }

    pub fn contains(&self, semantic_type: &str) -> bool {
        self.hashers.contains_key(semantic_type)
    }
}

impl fmt::Debug for SemanticHasherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hashers.keys()).finish()
    }
}

/// What to do with null cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Abort the table hash with `MissingValue`.
    #[default]
    Error,
    /// Encode nulls as a fixed sentinel tag, distinct from every real value,
    /// and skip semantic hashers for them.
    Sentinel,
}

impl FromStr for MissingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(MissingPolicy::Error),
            "sentinel" => Ok(MissingPolicy::Sentinel),
            other => Err(Error::InvalidArgument(format!(
                "unknown missing-value policy '{other}', expected error or sentinel"
            ))),
        }
    }
}

/// Table hasher with semantic-type overrides.
#[derive(Debug, Clone)]
pub struct SemanticTableHasher {
    chunk_size: usize,
    handle_missing: MissingPolicy,
    registry: SemanticHasherRegistry,
}

impl Default for SemanticTableHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, MissingPolicy::Error)
    }
}

impl SemanticTableHasher {
    /// A zero `chunk_size` reads one row at a time.
    pub fn new(chunk_size: usize, handle_missing: MissingPolicy) -> Self {
        Self { chunk_size: chunk_size.max(1), handle_missing, registry: SemanticHasherRegistry::new() }
    }

    pub fn with_registry(mut self, registry: SemanticHasherRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn register_semantic_hasher(
        &mut self, semantic_type: impl Into<String>, hasher: Arc<dyn SemanticHasher>,
    ) -> Option<Arc<dyn SemanticHasher>> {
        self.registry.register(semantic_type, hasher)
    }

    pub fn registry(&self) -> &SemanticHasherRegistry {
        &self.registry
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest of `table`.
    ///
    /// # Errors
    ///
    /// `MissingValue` on a null under [`MissingPolicy::Error`]; any error of a
    /// semantic hasher (e.g. `FileNotFound` for a dangling path).
    pub fn hash_table(&self, table: &dyn Table) -> Result<Digest, Error> {
        let rows = table.num_rows();
        let columns = table.columns();

        let mut writer = DigestWriter::new();
        canonical::write_str(&mut writer, "table");
        canonical::write_uint(&mut writer, rows as u64);
        canonical::write_len(&mut writer, columns.len());
        for index in 0..columns.len() {
            let digest = self.hash_column(table, index)?;
            canonical::write_digest(&mut writer, &digest);
        }

        tracing::debug!(rows, columns = columns.len(), chunk_size = self.chunk_size, "hashed table");
        Ok(writer.finalize())
    }

    fn hash_column(&self, table: &dyn Table, index: usize) -> Result<Digest, Error> {
        let schema = &table.columns()[index];
        let semantic = schema.semantic_type.as_deref().and_then(|t| self.registry.get(t).map(|h| (t, h)));
        if semantic.is_none()
            && let Some(tag) = &schema.semantic_type
        {
            tracing::debug!(column = %schema.name, semantic_type = %tag, "no semantic hasher registered, hashing raw values");
        }

        let mut writer = DigestWriter::new();
        canonical::write_str(&mut writer, &schema.name);
        canonical::write_str(&mut writer, schema.data_type.as_str());
        match semantic {
            Some((tag, _)) => canonical::write_str(&mut writer, tag),
            None => canonical::write_tag(&mut writer, canonical::TAG_NULL),
        }

        let rows = table.num_rows();
        let mut offset = 0;
        while offset < rows {
            let len = self.chunk_size.min(rows - offset);
            let values = table.chunk(index, offset, len)?;
            if values.len() != len {
                return Err(Error::InvalidArgument(format!(
                    "column '{}' returned {} values for a chunk of {len}",
                    schema.name,
                    values.len()
                )));
            }
            for (i, value) in values.iter().enumerate() {
                let row = offset + i;
                if value.is_null() {
                    match self.handle_missing {
                        MissingPolicy::Error => {
                            return Err(Error::MissingValue { column: schema.name.clone(), row });
                        }
                        MissingPolicy::Sentinel => canonical::write_tag(&mut writer, canonical::TAG_MISSING),
                    }
                    continue;
                }
                match semantic {
                    Some((_, hasher)) => canonical::write_digest(&mut writer, &hasher.hash_value(value)?),
                    None => value.write_canonical(&mut writer),
                }
            }
            offset += len;
        }

        Ok(writer.finalize())
    }
}

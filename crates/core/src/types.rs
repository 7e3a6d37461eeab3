//! Pipeline row types shared with the source layer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata half of a pipeline row.
pub type Tag = BTreeMap<String, String>;

/// Payload half of a pipeline row: key to file path.
pub type Packet = BTreeMap<String, String>;

/// A single path or an ordered collection of path sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSet {
    Path(PathBuf),
    Set(Vec<PathSet>),
}

impl From<PathBuf> for PathSet {
    fn from(path: PathBuf) -> Self {
        PathSet::Path(path)
    }
}

impl<T: Into<PathSet>> FromIterator<T> for PathSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        PathSet::Set(iter.into_iter().map(Into::into).collect())
    }
}

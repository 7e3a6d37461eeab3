//! Glob-pattern file source.
//!
//! For each file under the location matching the pattern, yields a tag from
//! the tag function and a packet mapping the source name to the file path.
//! Matching is relative to the location with `/` treated literally, so `*.txt`
//! stays in the top directory and `**/*.txt` recurses. Files are produced in
//! sorted path order.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use podprint_core::{ContentIdentifiable, Error, ExtractOptions, HashMode, IdentityStructure, Packet};
use walkdir::WalkDir;

use crate::source::{Keys, Source, infer_keys, reject_upstream};
use crate::stream::Stream;
use crate::tag::TagFunction;

/// Sources files from a directory matching a glob pattern.
#[derive(Debug, Clone)]
pub struct GlobSource {
    name: String,
    location: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
    label: Option<String>,
    tag_function: TagFunction,
    tag_function_hash_mode: HashMode,
    expected_tag_keys: Option<Vec<String>>,
}

impl GlobSource {
    /// `name` is the packet key, `location` the directory searched.
    pub fn builder(name: impl Into<String>, location: impl Into<PathBuf>) -> GlobSourceBuilder {
        GlobSourceBuilder {
            name: name.into(),
            location: location.into(),
            pattern: "*".to_string(),
            absolute_path: false,
            label: None,
            tag_function: None,
            tag_function_hash_mode: HashMode::Name,
            expected_tag_keys: None,
        }
    }

    /// Source with the default tag function and `name` hash mode.
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>, pattern: impl Into<String>) -> Result<Self, Error> {
        Self::builder(name, location).pattern(pattern).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn tag_function(&self) -> &TagFunction {
        &self.tag_function
    }

    fn max_depth(&self) -> usize {
        if self.pattern.contains("**") { usize::MAX } else { self.pattern.split('/').count() }
    }

    fn rows(&self) -> Stream {
        let root = self.location.clone();
        let matcher = self.matcher.clone();
        let tag_function = self.tag_function.clone();
        let name = self.name.clone();

        let rows = WalkDir::new(&self.location)
            .min_depth(1)
            .max_depth(self.max_depth())
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => return Some(Err(walk_error(&root, err))),
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                if !matcher.is_match(relative) {
                    return None;
                }
                let path = entry.path();
                tracing::trace!(path = %path.display(), "matched file");
                let packet = Packet::from([(name.clone(), path.to_string_lossy().into_owned())]);
                Some(Ok((tag_function.call(path), packet)))
            });
        Stream::new(rows)
    }
}

const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}', '\\'];

/// Whether every file matched by `pattern` has a distinct stem.
///
/// Holds when all matches share one directory and either the file name is
/// literal or it ends in a literal extension.
fn stems_are_unique(pattern: &str) -> bool {
    let (dir, file) = pattern.rsplit_once('/').unwrap_or(("", pattern));
    if dir.contains(GLOB_META) {
        return false;
    }
    if !file.contains(GLOB_META) {
        return true;
    }
    match file.rsplit_once('.') {
        Some((_, ext)) => !ext.is_empty() && !ext.contains(GLOB_META),
        None => false,
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(io) => Error::from_io(path, io),
        None => Error::InvalidArgument(format!("filesystem loop detected at {}", path.display())),
    }
}

impl Source for GlobSource {
    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn forward(&self, upstream: Vec<Stream>) -> Result<Stream, Error> {
        reject_upstream(upstream.len())?;
        tracing::debug!(source = %self, "streaming glob matches");
        Ok(self.rows())
    }

    fn identity_structure(&self, upstream: &[IdentityStructure]) -> IdentityStructure {
        let options = match self.tag_function_hash_mode {
            HashMode::Content => ExtractOptions::body_only(),
            _ => ExtractOptions::default(),
        };
        IdentityStructure::Seq(vec![
            "GlobSource".into(),
            (&self.name).into(),
            self.location.as_path().into(),
            (&self.pattern).into(),
            IdentityStructure::function(self.tag_function.info().clone(), self.tag_function_hash_mode, options),
        ])
        .extended(upstream.iter().cloned())
    }

    fn keys(&self, upstream: &[Stream], trigger_run: bool) -> Result<Keys, Error> {
        reject_upstream(upstream.len())?;
        if let Some(expected) = &self.expected_tag_keys {
            return Ok((Some(expected.clone()), Some(vec![self.name.clone()])));
        }
        if !trigger_run {
            return Ok((None, None));
        }
        infer_keys(self.forward(Vec::new())?)
    }

    /// `Some(true)` for the default tag function when the pattern cannot match
    /// two files with the same stem, otherwise `None`.
    fn claims_unique_tags(&self, upstream: &[Stream]) -> Result<Option<bool>, Error> {
        reject_upstream(upstream.len())?;
        if self.tag_function.is_default() && stems_are_unique(&self.pattern) {
            return Ok(Some(true));
        }
        Ok(None)
    }
}

impl ContentIdentifiable for GlobSource {
    fn identity_structure(&self) -> IdentityStructure {
        Source::identity_structure(self, &[])
    }
}

impl fmt::Display for GlobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobSource({}) ⇒ {}", self.location.join(&self.pattern).display(), self.name)
    }
}

/// Builder for [`GlobSource`].
#[derive(Debug)]
pub struct GlobSourceBuilder {
    name: String,
    location: PathBuf,
    pattern: String,
    absolute_path: bool,
    label: Option<String>,
    tag_function: Option<TagFunction>,
    tag_function_hash_mode: HashMode,
    expected_tag_keys: Option<Vec<String>>,
}

impl GlobSourceBuilder {
    /// Defaults to `*`.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Make the location absolute before it enters the identity structure.
    pub fn absolute_path(mut self, absolute_path: bool) -> Self {
        self.absolute_path = absolute_path;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn tag_function(mut self, tag_function: TagFunction) -> Self {
        self.tag_function = Some(tag_function);
        self
    }

    /// Defaults to [`HashMode::Name`].
    pub fn tag_function_hash_mode(mut self, mode: HashMode) -> Self {
        self.tag_function_hash_mode = mode;
        self
    }

    pub fn expected_tag_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_tag_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// # Errors
    ///
    /// `InvalidArgument` for an invalid glob pattern; an I/O error if the
    /// location cannot be made absolute.
    pub fn build(self) -> Result<GlobSource, Error> {
        let matcher = GlobBuilder::new(&self.pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("invalid glob pattern '{}': {e}", self.pattern)))?
            .compile_matcher();

        let location = if self.absolute_path {
            std::path::absolute(&self.location).map_err(|e| Error::from_io(&self.location, e))?
        } else {
            self.location
        };

        Ok(GlobSource {
            name: self.name,
            location,
            pattern: self.pattern,
            matcher,
            label: self.label,
            tag_function: self.tag_function.unwrap_or_default(),
            tag_function_hash_mode: self.tag_function_hash_mode,
            expected_tag_keys: self.expected_tag_keys,
        })
    }
}

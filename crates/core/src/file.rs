//! File content hashing.
//!
//! [`BasicFileHasher`] streams a file through SHA-256 in fixed-size chunks and
//! never holds the whole file in memory. [`CachedFileHasher`] memoizes any file
//! hasher through a [`StringCacher`]. [`CompositeFileHasher`] is what pipeline
//! code talks to: files, path sets and packets.
//!
//! ### Weak invalidation
//!
//! Cached entries are keyed by absolute path, modification time and size, not
//! by content. A rewrite that keeps both the size and the reported modification
//! time of a file returns the previously cached digest until the entry is
//! evicted or the cache cleared. Detection is only as good as the filesystem's
//! timestamp granularity.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::Error;
use crate::cache::StringCacher;
use crate::canonical::{self, Sink};
use crate::digest::{ALGORITHM, Digest, DigestWriter};
use crate::types::{Packet, PathSet};

/// Default read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Computes the digest of a single file.
pub trait FileHasher: Send + Sync {
    /// # Errors
    ///
    /// `FileNotFound` if `path` does not exist, `FileUnreadable` for any other
    /// I/O failure.
    fn hash_file(&self, path: &Path) -> Result<Digest, Error>;
}

/// Streams file content through SHA-256.
#[derive(Debug, Clone, Copy)]
pub struct BasicFileHasher {
    buffer_size: usize,
}

impl Default for BasicFileHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl BasicFileHasher {
    /// A zero `buffer_size` falls back to [`DEFAULT_BUFFER_SIZE`].
    pub fn new(buffer_size: usize) -> Self {
        let buffer_size = if buffer_size == 0 { DEFAULT_BUFFER_SIZE } else { buffer_size };
        Self { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl FileHasher for BasicFileHasher {
    fn hash_file(&self, path: &Path) -> Result<Digest, Error> {
        let mut file = File::open(path).map_err(|e| Error::from_io(path, e))?;
        let mut buf = vec![0u8; self.buffer_size];
        let mut writer = DigestWriter::new();
        let mut total = 0u64;

        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_io(path, e)),
            };
            writer.update(&buf[..n]);
            total += n as u64;
        }

        tracing::debug!(path = %path.display(), bytes = total, "hashed file content");
        Ok(writer.finalize())
    }
}

/// Memoizes another file hasher, keyed by path, modification time and size.
pub struct CachedFileHasher {
    inner: Arc<dyn FileHasher>,
    cacher: Arc<dyn StringCacher>,
}

impl CachedFileHasher {
    pub fn new(inner: Arc<dyn FileHasher>, cacher: Arc<dyn StringCacher>) -> Self {
        Self { inner, cacher }
    }

    /// Cache key for `path`: `file:{algorithm}:{absolute path}:{mtime ns}:{size}`.
    pub fn cache_key(path: &Path) -> Result<String, Error> {
        let absolute = fs::canonicalize(path).map_err(|e| Error::from_io(path, e))?;
        let metadata = fs::metadata(&absolute).map_err(|e| Error::from_io(&absolute, e))?;
        let modified = metadata.modified().map_err(|e| Error::from_io(&absolute, e))?;
        let mtime_ns: i128 = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i128,
            Err(e) => -(e.duration().as_nanos() as i128),
        };
        Ok(format!("file:{ALGORITHM}:{}:{mtime_ns}:{}", absolute.display(), metadata.len()))
    }
}

impl FileHasher for CachedFileHasher {
    fn hash_file(&self, path: &Path) -> Result<Digest, Error> {
        let key = Self::cache_key(path)?;
        let hex = self.cacher.get_or_compute(&key, &mut || Ok(self.inner.hash_file(path)?.to_hex()))?;
        hex.parse()
    }
}

/// Combines content digests with optional path metadata, and fingerprints
/// path sets and packets.
#[derive(Clone)]
pub struct CompositeFileHasher {
    file_hasher: Arc<dyn FileHasher>,
    path_sensitive: bool,
}

impl CompositeFileHasher {
    pub fn new(file_hasher: Arc<dyn FileHasher>) -> Self {
        Self { file_hasher, path_sensitive: false }
    }

    /// Streams every file on each call.
    pub fn basic(buffer_size: usize) -> Self {
        Self::new(Arc::new(BasicFileHasher::new(buffer_size)))
    }

    /// Memoizes content digests through `cacher`, with weak invalidation.
    pub fn cached(buffer_size: usize, cacher: Arc<dyn StringCacher>) -> Self {
        let inner: Arc<dyn FileHasher> = Arc::new(BasicFileHasher::new(buffer_size));
        Self::new(Arc::new(CachedFileHasher::new(inner, cacher)))
    }

    /// When set, file digests also cover the normalized absolute path and the
    /// size, so identical bytes at different locations hash differently.
    pub fn path_sensitive(mut self, path_sensitive: bool) -> Self {
        self.path_sensitive = path_sensitive;
        self
    }

    pub fn content_hasher(&self) -> Arc<dyn FileHasher> {
        Arc::clone(&self.file_hasher)
    }

    /// Digest of a path set. Directories hash as their sorted entries.
    pub fn hash_pathset(&self, pathset: &PathSet) -> Result<Digest, Error> {
        match pathset {
            PathSet::Path(path) if path.is_dir() => self.hash_directory(path),
            PathSet::Path(path) => self.hash_file(path),
            PathSet::Set(members) => {
                let mut writer = DigestWriter::new();
                canonical::write_str(&mut writer, "pathset");
                canonical::write_len(&mut writer, members.len());
                for member in members {
                    canonical::write_digest(&mut writer, &self.hash_pathset(member)?);
                }
                Ok(writer.finalize())
            }
        }
    }

    /// Digest of a packet: each key paired with the digest of the file it names,
    /// in key order.
    pub fn hash_packet(&self, packet: &Packet) -> Result<Digest, Error> {
        let mut writer = DigestWriter::new();
        canonical::write_str(&mut writer, "packet");
        canonical::write_len(&mut writer, packet.len());
        for (key, path) in packet {
            canonical::write_str(&mut writer, key);
            let digest = self.hash_pathset(&PathSet::Path(PathBuf::from(path)))?;
            canonical::write_digest(&mut writer, &digest);
        }
        Ok(writer.finalize())
    }

    fn hash_directory(&self, dir: &Path) -> Result<Digest, Error> {
        let mut entries = fs::read_dir(dir)
            .map_err(|e| Error::from_io(dir, e))?
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::from_io(dir, e))?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut writer = DigestWriter::new();
        canonical::write_str(&mut writer, "directory");
        canonical::write_len(&mut writer, entries.len());
        for (entry, file_type) in &entries {
            let name = entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            canonical::write_str(&mut writer, &name);
            let digest = if file_type.is_symlink() && entry.is_dir() {
                // Linked directories are identified by their target, never descended into.
                let target = fs::read_link(entry).map_err(|e| Error::from_io(entry, e))?;
                tracing::debug!(path = %entry.display(), target = %target.display(), "not following directory symlink");
                canonical::digest_strs(&["symlink", &target.to_string_lossy()])
            } else if file_type.is_dir() {
                self.hash_directory(entry)?
            } else {
                self.hash_file(entry)?
            };
            canonical::write_digest(&mut writer, &digest);
        }
        Ok(writer.finalize())
    }

    fn fold_path(&self, path: &Path, content: &Digest, sink: &mut impl Sink) -> Result<(), Error> {
        let absolute = fs::canonicalize(path).map_err(|e| Error::from_io(path, e))?;
        let size = fs::metadata(&absolute).map_err(|e| Error::from_io(&absolute, e))?.len();
        canonical::write_str(sink, "file");
        canonical::write_str(sink, &absolute.to_string_lossy());
        canonical::write_uint(sink, size);
        canonical::write_digest(sink, content);
        Ok(())
    }
}

impl FileHasher for CompositeFileHasher {
    fn hash_file(&self, path: &Path) -> Result<Digest, Error> {
        let content = self.file_hasher.hash_file(path)?;
        if !self.path_sensitive {
            return Ok(content);
        }
        let mut writer = DigestWriter::new();
        self.fold_path(path, &content, &mut writer)?;
        Ok(writer.finalize())
    }
}

//! Unified error types for podprint.
//!
//! Every failure aborts the current hash computation and is reported to the
//! immediate caller. Nothing here is retried and no error is ever turned into
//! a placeholder digest.

use std::io;
use std::path::PathBuf;

/// Unified error type for the hashing subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file to hash does not exist.
    #[error("FILE_NOT_FOUND: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The file exists but could not be read (permissions, I/O failure).
    #[error("FILE_UNREADABLE: {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The callable cannot be stably identified under the requested mode.
    #[error("UNSUPPORTED_CALLABLE: {0}")]
    UnsupportedCallableKind(String),

    /// A null cell was found while the missing-value policy is `error`.
    #[error("MISSING_VALUE: column '{column}' has a null at row {row}")]
    MissingValue { column: String, row: usize },

    /// Invalid input, e.g. upstream streams handed to a root source.
    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),

    /// Cache database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Classify an I/O error raised while opening or reading `path`.
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path),
            _ => Error::FileUnreadable { path, source: err },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingValue { column: "path".to_string(), row: 3 };
        assert!(err.to_string().contains("MISSING_VALUE"));
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_from_io_not_found() {
        let err = Error::from_io("/nope", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, Error::FileNotFound(p) if p == PathBuf::from("/nope")));
    }

    #[test]
    fn test_from_io_unreadable() {
        let err = Error::from_io("/secret", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(matches!(err, Error::FileUnreadable { .. }));
        assert!(err.to_string().starts_with("FILE_UNREADABLE"));
    }
}

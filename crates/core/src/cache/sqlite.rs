//! SQLite-backed string cache.
//!
//! Persists cached strings across processes. Opening the database applies the
//! performance pragmas (WAL mode) and runs pending migrations.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use super::locks::{KeyLocks, lock};
use super::{Error, StringCacher, migrations};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA temp_store=MEMORY;";

/// Persistent cache with the same capacity policy as the in-memory backend.
///
/// Recency is tracked with a monotonically increasing access sequence, so
/// eviction order does not depend on clock resolution. Unbounded caches skip
/// the recency update on reads.
#[derive(Debug)]
pub struct SqliteCacher {
    conn: Mutex<Connection>,
    max_size: Option<usize>,
    locks: KeyLocks,
}

impl SqliteCacher {
    /// Open a cache database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub fn open(path: impl AsRef<Path>, max_size: Option<usize>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Self::init(conn, max_size)
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory(max_size: Option<usize>) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, max_size)
    }

    fn init(conn: Connection, max_size: Option<usize>) -> Result<Self, Error> {
        conn.execute_batch(PRAGMAS)?;
        migrations::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn), max_size, locks: KeyLocks::new() })
    }

    fn next_seq(conn: &Connection) -> Result<i64, Error> {
        let seq = conn.query_row("SELECT COALESCE(MAX(accessed_seq), 0) + 1 FROM string_cache", [], |row| row.get(0))?;
        Ok(seq)
    }
}

impl StringCacher for SqliteCacher {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let conn = lock(&self.conn);
        let value: Option<String> = conn
            .query_row("SELECT value FROM string_cache WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;

        if value.is_some() && self.max_size.is_some() {
            let seq = Self::next_seq(&conn)?;
            conn.execute("UPDATE string_cache SET accessed_seq = ?1 WHERE key = ?2", params![seq, key])?;
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let conn = lock(&self.conn);
        let seq = Self::next_seq(&conn)?;
        conn.execute(
            "INSERT INTO string_cache (key, value, created_at, accessed_seq) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                accessed_seq = excluded.accessed_seq",
            params![key, value, chrono::Utc::now().to_rfc3339(), seq],
        )?;

        if let Some(max) = self.max_size {
            let evicted = conn.execute(
                "DELETE FROM string_cache WHERE key IN (
                    SELECT key FROM string_cache ORDER BY accessed_seq DESC LIMIT -1 OFFSET ?1
                )",
                params![max as i64],
            )?;
            if evicted > 0 {
                tracing::debug!(evicted, max_size = max, "evicted least recently used entries");
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        lock(&self.conn).execute("DELETE FROM string_cache", [])?;
        Ok(())
    }

    fn len(&self) -> Result<usize, Error> {
        let count: i64 = lock(&self.conn).query_row("SELECT COUNT(*) FROM string_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

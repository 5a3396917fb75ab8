//! Content hashes of tracked files.

use crate::store::path_key;
use crate::IndexerError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A file the scanner has indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub path: PathBuf,
    /// SHA-256 hex digest of the file bytes
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
}

/// Stored in place of a digest for a file with a failed unit. Never equal
/// to a real digest, so the file is dispatched again on the next scan.
pub const RETRY_HASH: &str = "retry";

impl TrackedFile {
    pub fn needs_retry(&self) -> bool {
        self.content_hash == RETRY_HASH
    }
}

/// Compute the SHA-256 hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SQLite table of [`TrackedFile`]s.
pub struct HashStore {
    conn: Mutex<Option<Connection>>,
}

impl HashStore {
    pub fn open(path: &Path) -> Result<Self, IndexerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS tracked_files (
                path TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                last_indexed_at TEXT NOT NULL
            );
            ",
        )?;
        debug!(path = ?path, "Opened hash store");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<R, IndexerError>,
    ) -> Result<R, IndexerError> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| IndexerError::Closed("file_scanner".to_string()))?;
        f(conn)
    }

    pub fn get(&self, path: &Path) -> Result<Option<TrackedFile>, IndexerError> {
        self.with_conn(|conn| {
            let tracked = conn
                .query_row(
                    "SELECT content_hash, last_indexed_at FROM tracked_files WHERE path = ?1",
                    params![path_key(path)],
                    |row| {
                        Ok(TrackedFile {
                            path: path.to_path_buf(),
                            content_hash: row.get(0)?,
                            last_indexed_at: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(tracked)
        })
    }

    /// Stored hash for `path`, if tracked.
    pub fn hash_of(&self, path: &Path) -> Result<Option<String>, IndexerError> {
        Ok(self.get(path)?.map(|t| t.content_hash))
    }

    /// Insert or update records in one transaction.
    pub fn save(&self, files: &[TrackedFile]) -> Result<(), IndexerError> {
        if files.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO tracked_files (path, content_hash, last_indexed_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(path) DO UPDATE SET
                        content_hash = excluded.content_hash,
                        last_indexed_at = excluded.last_indexed_at",
                )?;
                for file in files {
                    stmt.execute(params![
                        path_key(&file.path),
                        file.content_hash,
                        file.last_indexed_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn remove(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        if paths.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached("DELETE FROM tracked_files WHERE path = ?1")?;
                for path in paths {
                    stmt.execute(params![path_key(path)])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Every tracked path, sorted.
    pub fn paths(&self) -> Result<Vec<PathBuf>, IndexerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path FROM tracked_files ORDER BY path")?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|p| p.map(PathBuf::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(paths)
        })
    }

    pub fn len(&self) -> Result<usize, IndexerError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM tracked_files", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool, IndexerError> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<(), IndexerError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM tracked_files", [])?;
            info!(removed, "Cleared file hashes");
            Ok(())
        })
    }

    pub fn close(&self) -> Result<(), IndexerError> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }
}

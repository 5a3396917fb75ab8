//! Persistent, file-scoped, multi-value fact storage.
//!
//! A [`FactStore`] maps `(file, key)` to one record and answers the derived
//! lookups `key -> [record]` and `file -> [key]`. Every store owns a single
//! SQLite database, so a damaged or outdated store never affects another one.
//!
//! Records are MessagePack-encoded with field names, which means fields marked
//! `#[serde(skip)]` stay in memory and are never written.

use crate::IndexerError;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Facts produced by one file, in the order the indexer emitted them.
pub type FileFacts<T> = Vec<(String, T)>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS facts (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        file_path TEXT NOT NULL,
        key TEXT NOT NULL,
        value BLOB NOT NULL,
        UNIQUE(file_path, key)
    );
    CREATE INDEX IF NOT EXISTS idx_facts_key ON facts(key, seq);
";

/// A typed fact store backed by one SQLite file.
///
/// Writes go through a dedicated connection and are serialized by its lock.
/// Reads use a second connection; with WAL journaling they see either the
/// state before or after a file's replace, never a mix.
pub struct FactStore<T> {
    name: String,
    path: PathBuf,
    writer: Mutex<Option<Connection>>,
    reader: Mutex<Option<Connection>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> FactStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open (or create) the store at `path`. The store is named after the
    /// file stem in logs and errors.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());

        let writer = Connection::open(&path)?;
        configure(&writer)?;
        writer.execute_batch(SCHEMA)?;

        let reader = Connection::open(&path)?;
        configure(&reader)?;

        debug!(store = %name, path = ?path, "Opened fact store");

        Ok(Self {
            name,
            path,
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
            _record: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the complete fact set of every file in `batch`.
    ///
    /// Each file is replaced in its own transaction: keys the file no longer
    /// produces are deleted and the remaining ones are upserted. An empty
    /// fact list removes everything the file owned. When the surviving keys
    /// keep their relative order and new keys only follow them, existing
    /// records keep their position in the global order. Otherwise the file's
    /// records are rewritten in emission order and move to the end of the
    /// global order. When a key repeats within one file the last record wins
    /// at the position of its first occurrence.
    pub fn batch_save_items<P>(&self, batch: &[(P, FileFacts<T>)]) -> Result<(), IndexerError>
    where
        P: AsRef<Path>,
    {
        let mut guard = self.writer.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| IndexerError::Closed(self.name.clone()))?;

        for (file, facts) in batch {
            let file = path_key(file.as_ref());
            let encoded = facts
                .iter()
                .map(|(key, value)| Ok((key.as_str(), rmp_serde::to_vec_named(value)?)))
                .collect::<Result<Vec<_>, IndexerError>>()?;

            let tx = conn.transaction()?;
            {
                let mut seen = HashSet::new();
                let new_order: Vec<&str> = encoded
                    .iter()
                    .map(|(k, _)| *k)
                    .filter(|k| seen.insert(*k))
                    .collect();

                let mut select = tx.prepare_cached(
                    "SELECT key FROM facts WHERE file_path = ?1 ORDER BY seq",
                )?;
                let (kept, stale): (Vec<String>, Vec<String>) = select
                    .query_map(params![file], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .partition(|key| seen.contains(key.as_str()));

                let in_order = kept
                    .iter()
                    .map(String::as_str)
                    .eq(new_order.iter().take(kept.len()).copied());

                if in_order {
                    let mut delete =
                        tx.prepare_cached("DELETE FROM facts WHERE file_path = ?1 AND key = ?2")?;
                    for key in &stale {
                        delete.execute(params![file, key])?;
                    }
                } else {
                    tx.execute("DELETE FROM facts WHERE file_path = ?1", params![file])?;
                }

                let mut upsert = tx.prepare_cached(
                    "INSERT INTO facts (file_path, key, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(file_path, key) DO UPDATE SET value = excluded.value
                     WHERE facts.value IS NOT excluded.value",
                )?;
                for (key, value) in &encoded {
                    upsert.execute(params![file, key, value])?;
                }
            }
            tx.commit()?;
        }

        debug!(store = %self.name, files = batch.len(), "Saved facts");
        Ok(())
    }

    /// Remove every fact owned by the given files.
    pub fn batch_delete_by_file_paths<P>(&self, paths: &[P]) -> Result<(), IndexerError>
    where
        P: AsRef<Path>,
    {
        if paths.is_empty() {
            return Ok(());
        }

        let mut guard = self.writer.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| IndexerError::Closed(self.name.clone()))?;

        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut delete = tx.prepare_cached("DELETE FROM facts WHERE file_path = ?1")?;
            for path in paths {
                removed += delete.execute(params![path_key(path.as_ref())])?;
            }
        }
        tx.commit()?;

        debug!(store = %self.name, files = paths.len(), removed, "Deleted facts");
        Ok(())
    }

    /// Every record stored under `key`, across all files, in insertion order.
    pub fn get_values(&self, key: &str) -> Result<Vec<T>, IndexerError> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT value FROM facts WHERE key = ?1 ORDER BY seq")?;
            let blobs = stmt
                .query_map(params![key], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            decode_all(&blobs)
        })
    }

    /// Every record in the store, in insertion order.
    pub fn get_all_values(&self) -> Result<Vec<T>, IndexerError> {
        self.read(|conn| {
            let mut stmt = conn.prepare_cached("SELECT value FROM facts ORDER BY seq")?;
            let blobs = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            decode_all(&blobs)
        })
    }

    /// Distinct keys, ordered by their first insertion.
    pub fn get_all_keys(&self) -> Result<Vec<String>, IndexerError> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT key FROM facts GROUP BY key ORDER BY MIN(seq)")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    /// Keys owned by one file, in insertion order.
    pub fn keys_for_file(&self, path: &Path) -> Result<Vec<String>, IndexerError> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT key FROM facts WHERE file_path = ?1 ORDER BY seq")?;
            let keys = stmt
                .query_map(params![path_key(path)], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    /// Number of stored `(file, key)` entries.
    pub fn len(&self) -> Result<usize, IndexerError> {
        self.read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool, IndexerError> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), IndexerError> {
        let guard = self.writer.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| IndexerError::Closed(self.name.clone()))?;
        let removed = conn.execute("DELETE FROM facts", [])?;
        info!(store = %self.name, removed, "Cleared fact store");
        Ok(())
    }

    /// Release both connections. Waits for in-flight reads and writes to
    /// finish; later calls fail with [`IndexerError::Closed`]. Closing twice
    /// is a no-op.
    pub fn close(&self) -> Result<(), IndexerError> {
        let writer = self.writer.lock().take();
        let reader = self.reader.lock().take();

        for conn in [reader, writer].into_iter().flatten() {
            conn.close().map_err(|(_, e)| e)?;
        }
        debug!(store = %self.name, "Closed fact store");
        Ok(())
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&Connection) -> Result<R, IndexerError>,
    ) -> Result<R, IndexerError> {
        let guard = self.reader.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| IndexerError::Closed(self.name.clone()))?;
        f(conn)
    }
}

impl<T> std::fmt::Debug for FactStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

fn configure(conn: &Connection) -> Result<(), IndexerError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA synchronous = NORMAL;
        ",
    )?;
    Ok(())
}

fn decode_all<T: DeserializeOwned>(blobs: &[Vec<u8>]) -> Result<Vec<T>, IndexerError> {
    blobs
        .iter()
        .map(|blob| rmp_serde::from_slice(blob).map_err(IndexerError::from))
        .collect()
}

/// Storage key for a file path.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

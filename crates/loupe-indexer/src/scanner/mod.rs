//! Change detection and fan-out to domain indexers.
//!
//! The [`Scanner`] hashes project files, reparses the ones whose content
//! changed, and hands each tree to every registered [`DomainIndexer`] that
//! accepts the path. Hashing and parsing run on a rayon pool sized by
//! [`ScanOptions::workers`], one chunk of files at a time; dispatch to
//! indexers stays sequential in path order so store insertion order is
//! reproducible.
//!
//! Every dispatched file gets a hash record. A file with a failed unit is
//! recorded with [`RETRY_HASH`], which never matches a real digest, so the
//! next scan dispatches it again and deletion still finds it.
//!
//! All operations are blocking. Async callers run them on a blocking task.

mod hashes;
mod walker;

pub use hashes::{content_hash, HashStore, TrackedFile, RETRY_HASH};
pub use walker::{FileEntry, SkipDirs, Walker, DEFAULT_SKIP_DIRS};

use crate::grammar::{detect_file_type, Parser};
use crate::indexer::DomainIndexer;
use crate::syntax::SyntaxTree;
use crate::IndexerError;
use chrono::Utc;
use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// File name of the hash database inside the cache directory.
pub const HASH_DB_FILE: &str = "file_scanner.db";

/// Options for scanning a project.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum file size to index in bytes (larger files are skipped)
    pub max_file_size: u64,
    /// Number of hashing/parsing threads
    pub workers: usize,
    /// Files prepared per round before dispatch
    pub chunk_size: usize,
    /// Directory names skipped in addition to the defaults
    pub extra_skip_dirs: Vec<String>,
    /// Whether to follow symlinks while walking
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024,
            workers: default_workers(),
            chunk_size: 50,
            extra_skip_dirs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

/// Available parallelism plus two, capped at 16.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus + 2).min(16)
}

/// Observable scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning { full: bool },
    Closed,
}

/// Outcome of one scanner operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Files considered
    pub seen: usize,
    /// Files parsed and dispatched
    pub indexed: usize,
    /// Files skipped because their hash matched
    pub unchanged: usize,
    /// Files whose facts were removed
    pub removed: usize,
    /// Files skipped for size or read errors
    pub skipped: usize,
    /// Failed (file, indexer) units; retried on the next scan
    pub failed: usize,
    pub duration: Duration,
}

/// Result of hashing and parsing one file off the dispatch thread.
enum Prepared {
    Unchanged,
    Missing,
    Skipped,
    /// Over `max_file_size`; any facts from an earlier scan are dropped
    Oversized,
    Changed {
        hash: String,
        source: String,
        tree: Result<SyntaxTree, IndexerError>,
    },
}

/// Tracks active scans for [`Scanner::state`].
struct ActiveScan<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> ActiveScan<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for ActiveScan<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Hash-driven dispatcher from project files to domain indexers.
pub struct Scanner {
    root: PathBuf,
    options: ScanOptions,
    skip_dirs: SkipDirs,
    hashes: HashStore,
    pool: ThreadPool,
    indexers: RwLock<Vec<Arc<dyn DomainIndexer>>>,
    full_scans: AtomicUsize,
    partial_scans: AtomicUsize,
    closed: AtomicBool,
}

impl Scanner {
    /// Create a scanner for `root`, keeping its hash table in `cache_dir`.
    pub fn new(root: &Path, cache_dir: &Path, options: ScanOptions) -> Result<Self, IndexerError> {
        let root = root
            .canonicalize()
            .map_err(|_| IndexerError::NotFound(root.to_path_buf()))?;
        let hashes = HashStore::open(&cache_dir.join(HASH_DB_FILE))?;
        let skip_dirs = SkipDirs::with_extra(options.extra_skip_dirs.iter().cloned());
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|i| format!("loupe-scan-{i}"))
            .build()?;

        Ok(Self {
            root,
            options,
            skip_dirs,
            hashes,
            pool,
            indexers: RwLock::new(Vec::new()),
            full_scans: AtomicUsize::new(0),
            partial_scans: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a domain indexer. Registration happens before scanning.
    pub fn add_indexer(&self, indexer: Arc<dyn DomainIndexer>) {
        debug!(indexer = indexer.id(), "Registered indexer");
        self.indexers.write().push(indexer);
    }

    /// Ids of the registered indexers, in registration order.
    pub fn indexer_ids(&self) -> Vec<&'static str> {
        self.indexers.read().iter().map(|i| i.id()).collect()
    }

    pub fn state(&self) -> ScanState {
        if self.closed.load(Ordering::SeqCst) {
            ScanState::Closed
        } else if self.full_scans.load(Ordering::SeqCst) > 0 {
            ScanState::Scanning { full: true }
        } else if self.partial_scans.load(Ordering::SeqCst) > 0 {
            ScanState::Scanning { full: false }
        } else {
            ScanState::Idle
        }
    }

    /// Whether `path` would be scanned: a known file type outside skipped
    /// directories.
    pub fn is_indexable(&self, path: &Path) -> bool {
        detect_file_type(path).is_some() && !self.skip_dirs.excludes(&self.root, path)
    }

    /// Scan the whole project.
    ///
    /// With `force`, every hash and every indexer's facts are cleared first.
    /// Tracked files no longer present are removed from every indexer.
    pub fn index_all(&self, force: bool) -> Result<ScanReport, IndexerError> {
        self.ensure_open()?;
        let _active = ActiveScan::enter(&self.full_scans);
        let start = Instant::now();

        info!(root = ?self.root, force, "Starting full scan");

        if force {
            self.clear_hashes()?;
        }

        let walker = Walker::new(
            &self.root,
            self.skip_dirs.clone(),
            self.options.follow_symlinks,
        );
        let paths: Vec<PathBuf> = walker.walk().into_iter().map(|e| e.path).collect();

        let gone: Vec<PathBuf> = {
            let present: HashSet<&PathBuf> = paths.iter().collect();
            self.hashes
                .paths()?
                .into_iter()
                .filter(|p| !present.contains(p))
                .collect()
        };

        let mut report = ScanReport::default();
        if !gone.is_empty() {
            self.dispatch_removal(&gone, &mut report)?;
        }

        self.process(&paths, &mut report)?;

        report.duration = start.elapsed();
        info!(
            seen = report.seen,
            indexed = report.indexed,
            unchanged = report.unchanged,
            removed = report.removed,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "Full scan complete"
        );
        Ok(report)
    }

    /// Index an explicit set of files. Paths that no longer exist are
    /// treated as removals; paths that would not be scanned are ignored.
    pub fn index_files(&self, paths: &[PathBuf]) -> Result<ScanReport, IndexerError> {
        self.ensure_open()?;
        let _active = ActiveScan::enter(&self.partial_scans);
        let start = Instant::now();

        let mut paths: Vec<PathBuf> = paths
            .iter()
            .map(|p| self.resolve(p))
            .filter(|p| {
                let keep = self.is_indexable(p);
                if !keep {
                    debug!(path = ?p, "Ignoring path");
                }
                keep
            })
            .collect();
        paths.sort();
        paths.dedup();

        let mut report = ScanReport::default();
        self.process(&paths, &mut report)?;

        report.duration = start.elapsed();
        debug!(
            files = paths.len(),
            indexed = report.indexed,
            removed = report.removed,
            "Indexed files"
        );
        Ok(report)
    }

    /// Remove every fact owned by `paths` and forget their hashes.
    pub fn remove_files(&self, paths: &[PathBuf]) -> Result<ScanReport, IndexerError> {
        self.ensure_open()?;
        let _active = ActiveScan::enter(&self.partial_scans);
        let start = Instant::now();

        let paths: Vec<PathBuf> = paths.iter().map(|p| self.resolve(p)).collect();
        let mut report = ScanReport::default();
        self.dispatch_removal(&paths, &mut report)?;

        report.duration = start.elapsed();
        Ok(report)
    }

    /// Clear every registered indexer, then every stored hash.
    pub fn clear_hashes(&self) -> Result<(), IndexerError> {
        self.ensure_open()?;
        let indexers = self.indexers.read().clone();
        for indexer in &indexers {
            indexer.clear()?;
        }
        self.hashes.clear()?;
        info!(indexers = indexers.len(), "Cleared index");
        Ok(())
    }

    /// Hash record for one file.
    pub fn tracked_file(&self, path: &Path) -> Result<Option<TrackedFile>, IndexerError> {
        self.hashes.get(&self.resolve(path))
    }

    pub fn tracked_count(&self) -> Result<usize, IndexerError> {
        self.hashes.len()
    }

    /// Close every indexer and the hash table. Later operations fail with
    /// [`IndexerError::Closed`].
    pub fn close(&self) -> Result<(), IndexerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut first_error = None;
        for indexer in self.indexers.read().iter() {
            if let Err(e) = indexer.close() {
                error!(indexer = indexer.id(), error = %e, "Failed to close indexer");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.hashes.close() {
            first_error.get_or_insert(e);
        }

        info!("Scanner closed");
        first_error.map_or(Ok(()), Err)
    }

    fn ensure_open(&self) -> Result<(), IndexerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexerError::Closed("scanner".to_string()));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn process(&self, paths: &[PathBuf], report: &mut ScanReport) -> Result<(), IndexerError> {
        let chunk_size = self.options.chunk_size.max(1);
        for chunk in paths.chunks(chunk_size) {
            let prepared = self.prepare_chunk(chunk);
            self.dispatch_chunk(prepared, report)?;
        }
        Ok(())
    }

    /// Hash and parse a chunk in parallel, one [`Parser`] per pool thread.
    /// Output keeps the chunk's order. A panicking worker propagates.
    fn prepare_chunk(&self, chunk: &[PathBuf]) -> Vec<(PathBuf, Prepared)> {
        self.pool.install(|| {
            chunk
                .par_iter()
                .map_init(Parser::new, |parser, path| {
                    (path.clone(), self.prepare(path, parser))
                })
                .collect()
        })
    }

    fn prepare(&self, path: &Path, parser: &mut Parser) -> Prepared {
        let bytes = match std::fs::metadata(path) {
            Ok(meta) if !meta.is_file() => return Prepared::Skipped,
            Ok(meta) if meta.len() > self.options.max_file_size => {
                debug!(path = ?path, size = meta.len(), "Skipping large file");
                return Prepared::Oversized;
            }
            Ok(_) => match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Prepared::Missing,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to read file");
                    return Prepared::Skipped;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Prepared::Missing,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to stat file");
                return Prepared::Skipped;
            }
        };

        let hash = content_hash(&bytes);
        match self.hashes.hash_of(path) {
            Ok(Some(stored)) if stored == hash => return Prepared::Unchanged,
            Ok(_) => {}
            Err(e) => debug!(path = ?path, error = %e, "Hash lookup failed"),
        }

        let source = String::from_utf8_lossy(&bytes).into_owned();
        let tree = parser.parse_path(path, &source);
        Prepared::Changed { hash, source, tree }
    }

    fn dispatch_chunk(
        &self,
        prepared: Vec<(PathBuf, Prepared)>,
        report: &mut ScanReport,
    ) -> Result<(), IndexerError> {
        let indexers = self.indexers.read().clone();
        let mut tracked = Vec::new();
        let mut dropped = Vec::new();

        for (path, outcome) in prepared {
            report.seen += 1;
            match outcome {
                Prepared::Unchanged => report.unchanged += 1,
                Prepared::Skipped => report.skipped += 1,
                Prepared::Missing => dropped.push(path),
                Prepared::Oversized => {
                    report.skipped += 1;
                    if self.hashes.hash_of(&path)?.is_some() {
                        dropped.push(path);
                    }
                }
                Prepared::Changed { hash, source, tree } => {
                    let accepting: Vec<_> = indexers.iter().filter(|i| i.accepts(&path)).collect();
                    let mut ok = true;

                    match tree {
                        Ok(tree) => {
                            for indexer in &accepting {
                                if let Err(e) = indexer.index(&path, &tree, &source) {
                                    warn!(path = ?path, indexer = indexer.id(), error = %e, "Indexer failed");
                                    report.failed += 1;
                                    ok = false;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(path = ?path, error = %e, "Parse failed, dropping facts");
                            let owned = [path.clone()];
                            for indexer in &accepting {
                                if let Err(e) = indexer.removed_files(&owned) {
                                    warn!(path = ?path, indexer = indexer.id(), error = %e, "Removal failed");
                                    report.failed += 1;
                                    ok = false;
                                }
                            }
                        }
                    }

                    report.indexed += 1;
                    tracked.push(TrackedFile {
                        path,
                        content_hash: if ok { hash } else { RETRY_HASH.to_string() },
                        last_indexed_at: Utc::now(),
                    });
                }
            }
        }

        self.hashes.save(&tracked)?;
        if !dropped.is_empty() {
            self.dispatch_removal(&dropped, report)?;
        }
        Ok(())
    }

    fn dispatch_removal(&self, paths: &[PathBuf], report: &mut ScanReport) -> Result<(), IndexerError> {
        let indexers = self.indexers.read().clone();
        for indexer in &indexers {
            if let Err(e) = indexer.removed_files(paths) {
                warn!(indexer = indexer.id(), files = paths.len(), error = %e, "Removal failed");
                report.failed += 1;
            }
        }
        self.hashes.remove(paths)?;
        report.removed += paths.len();
        debug!(files = paths.len(), "Removed files");
        Ok(())
    }
}

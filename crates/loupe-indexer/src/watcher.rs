//! File system watcher feeding incremental indexing.
//!
//! Events are debounced by `notify-debouncer-full`, filtered down to files
//! the scanner would index, and delivered on a tokio channel. A
//! [`ChangeBatcher`] coalesces them into index and removal sets.

use crate::grammar::detect_file_type;
use crate::scanner::SkipDirs;
use crate::IndexerError;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// File change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A file system change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Options for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Debounce duration
    pub debounce_duration: Duration,
    /// Directory names whose contents are ignored
    pub skip_dirs: SkipDirs,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(200),
            skip_dirs: SkipDirs::default(),
        }
    }
}

/// Recursive, debounced project watcher.
pub struct FileWatcher {
    options: WatcherOptions,
    tx: mpsc::Sender<FileChange>,
    rx: mpsc::Receiver<FileChange>,
    _debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl FileWatcher {
    pub fn new(options: WatcherOptions) -> Self {
        let (tx, rx) = mpsc::channel(1000);
        Self {
            options,
            tx,
            rx,
            _debouncer: None,
        }
    }

    /// Start watching `root` recursively.
    pub fn watch(&mut self, root: &Path) -> Result<(), IndexerError> {
        let root = root
            .canonicalize()
            .map_err(|_| IndexerError::NotFound(root.to_path_buf()))?;

        let tx = self.tx.clone();
        let skip_dirs = self.options.skip_dirs.clone();
        let filter_root = root.clone();

        let mut debouncer = new_debouncer(
            self.options.debounce_duration,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        for change in convert_event(&event.event) {
                            if skip_dirs.excludes(&filter_root, &change.path) {
                                continue;
                            }
                            if let Err(e) = tx.blocking_send(change) {
                                error!(error = %e, "Failed to send change event");
                            }
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "Watcher error");
                    }
                }
            },
        )
        .map_err(|e| IndexerError::Watcher(e.to_string()))?;

        debouncer
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e: notify::Error| IndexerError::Watcher(e.to_string()))?;

        info!(path = ?root, debounce_ms = self.options.debounce_duration.as_millis() as u64, "Started watching");

        self._debouncer = Some(debouncer);
        Ok(())
    }

    /// Receive the next change event.
    pub async fn next(&mut self) -> Option<FileChange> {
        self.rx.recv().await
    }

    /// Try to receive a change event without blocking.
    pub fn try_next(&mut self) -> Option<FileChange> {
        self.rx.try_recv().ok()
    }
}

/// Convert a notify event into changes for indexable files.
fn convert_event(event: &Event) -> Vec<FileChange> {
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Any | EventKind::Access(_) | EventKind::Other => return Vec::new(),
    };
    // renames report old and new paths; existence decides which is which
    let is_rename = matches!(event.kind, EventKind::Modify(ModifyKind::Name(_)));

    event
        .paths
        .iter()
        .filter(|path| !path.is_dir() && detect_file_type(path).is_some())
        .map(|path| {
            let kind = if is_rename && !path.exists() {
                ChangeKind::Deleted
            } else {
                kind
            };
            debug!(path = ?path, kind = ?kind, "File change detected");
            FileChange {
                path: path.clone(),
                kind,
            }
        })
        .collect()
}

/// Coalesces file changes into one batch per debounce window.
pub struct ChangeBatcher {
    changes: Vec<FileChange>,
    batch_timeout: Duration,
    last_batch: std::time::Instant,
}

impl ChangeBatcher {
    pub fn new(batch_timeout: Duration) -> Self {
        Self {
            changes: Vec::new(),
            batch_timeout,
            last_batch: std::time::Instant::now(),
        }
    }

    /// Add a change. A later change for the same path replaces the earlier
    /// one, except that a deletion is only undone by a re-creation.
    pub fn add(&mut self, change: FileChange) {
        if let Some(existing) = self.changes.iter_mut().find(|c| c.path == change.path) {
            match change.kind {
                ChangeKind::Deleted | ChangeKind::Created => existing.kind = change.kind,
                ChangeKind::Modified if existing.kind != ChangeKind::Deleted => {
                    existing.kind = ChangeKind::Modified
                }
                ChangeKind::Modified => {}
            }
        } else {
            self.changes.push(change);
        }
    }

    /// Check if the batch is ready to process.
    pub fn is_ready(&self) -> bool {
        !self.changes.is_empty() && self.last_batch.elapsed() >= self.batch_timeout
    }

    /// Take the batch as `(paths to index, paths to remove)`.
    pub fn take(&mut self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        self.last_batch = std::time::Instant::now();
        let mut index = Vec::new();
        let mut remove = Vec::new();
        for change in std::mem::take(&mut self.changes) {
            match change.kind {
                ChangeKind::Deleted => remove.push(change.path),
                ChangeKind::Created | ChangeKind::Modified => index.push(change.path),
            }
        }
        (index, remove)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

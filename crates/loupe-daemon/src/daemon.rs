//! Daemon lifecycle management.

use anyhow::{Context, Result};
use loupe_core::{Engine, EngineEvent, LoupeConfig};
use loupe_indexer::{ChangeBatcher, FileWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::signals;

/// How often a pending change batch is checked for readiness.
const BATCH_POLL: Duration = Duration::from_millis(50);

/// Indexing work, applied one job at a time in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Job {
    IndexAll { force: bool },
    Index(Vec<PathBuf>),
    Remove(Vec<PathBuf>),
}

/// The main daemon process
pub struct Daemon {
    config: LoupeConfig,
    engine: Arc<Engine>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    /// Create a daemon for the project at `root`
    pub fn new(root: &Path, config: LoupeConfig) -> Result<Self> {
        let engine = Engine::open(root, &config)
            .with_context(|| format!("Failed to open index for {}", root.display()))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            engine: Arc::new(engine),
            shutdown_tx,
        })
    }

    /// Request a graceful shutdown
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the daemon until a shutdown signal arrives
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            root = %self.engine.root().display(),
            cache = %self.engine.cache_dir().display(),
            watch = self.config.watch,
            "Daemon starting"
        );

        let events = tokio::spawn(log_events(self.engine.subscribe()));

        // The initial scan goes first; the watcher starts right away
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = tokio::spawn(apply_jobs(self.engine.clone(), queue));
        let force = self.engine.needs_rebuild();
        let _ = jobs.send(Job::IndexAll { force });

        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            result = self.watch(&jobs), if self.config.watch => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Watcher stopped");
                }
            }
            reason = signals::shutdown_signal(shutdown_rx) => {
                tracing::info!(%reason, "Shutting down");
            }
        }

        // Closing the queue lets the worker finish what it already accepted
        drop(jobs);
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Indexing worker panicked");
        }

        events.abort();
        self.cleanup()
    }

    /// Queue debounced file changes for the indexing worker.
    async fn watch(&self, jobs: &mpsc::UnboundedSender<Job>) -> Result<()> {
        let mut watcher = FileWatcher::new(self.config.watcher_options());
        watcher
            .watch(self.engine.root())
            .context("Failed to start file watcher")?;

        let mut batcher = ChangeBatcher::new(Duration::from_millis(self.config.debounce_ms));
        let mut poll = tokio::time::interval(BATCH_POLL);

        loop {
            tokio::select! {
                change = watcher.next() => match change {
                    Some(change) => batcher.add(change),
                    None => anyhow::bail!("Watcher channel closed"),
                },
                _ = poll.tick() => {
                    if !batcher.is_ready() {
                        continue;
                    }
                    let (changed, removed) = batcher.take();
                    tracing::debug!(changed = changed.len(), removed = removed.len(), "Processing change batch");
                    if !removed.is_empty() && jobs.send(Job::Remove(removed)).is_err() {
                        anyhow::bail!("Indexing worker stopped");
                    }
                    if !changed.is_empty() && jobs.send(Job::Index(changed)).is_err() {
                        anyhow::bail!("Indexing worker stopped");
                    }
                }
            }
        }
    }

    fn cleanup(&self) -> Result<()> {
        tracing::info!("Cleaning up...");
        self.engine.shutdown().context("Failed to close index")?;
        tracing::info!("Cleanup complete");
        Ok(())
    }
}

/// Run queued jobs one at a time until every sender is gone. A failed or
/// panicked job is logged and the next one runs.
async fn apply_jobs(engine: Arc<Engine>, mut queue: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = queue.recv().await {
        tracing::debug!(?job, "Applying job");
        let handle = match &job {
            Job::IndexAll { force } => engine.spawn_index_all(*force),
            Job::Index(paths) => engine.spawn_index_files(paths.clone()),
            Job::Remove(paths) => engine.spawn_remove_files(paths.clone()),
        };
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(?job, error = %e, "Job failed"),
            Err(e) => tracing::error!(?job, error = %e, "Job panicked"),
        }
    }
    tracing::debug!("Indexing worker stopped");
}

/// Log engine lifecycle events until the channel closes.
async fn log_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::IndexingStarted { full }) => {
                tracing::debug!(full, "Indexing started");
            }
            Ok(EngineEvent::IndexingCompleted { full, elapsed, report }) => {
                tracing::info!(
                    full,
                    indexed = report.indexed,
                    removed = report.removed,
                    failed = report.failed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Indexing completed"
                );
            }
            Ok(EngineEvent::IndexingFailed { full, message }) => {
                tracing::error!(full, error = %message, "Indexing failed");
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Dropped engine events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

//! The indexing engine: one scanner plus typed handles to every domain
//! indexer, with background indexing tasks that report over a broadcast
//! channel.

use crate::{CoreError, LoupeConfig, ProjectCache};
use loupe_domains::{
    ComponentsIndexer, ExtensionsIndexer, ServicesIndexer, SnippetsIndexer, SystemConfigIndexer,
    TemplatesIndexer, ThemeIndexer,
};
use loupe_indexer::{IndexerError, ScanReport, Scanner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Capacity of the event channel; slow subscribers miss older events.
const EVENT_CAPACITY: usize = 64;

/// Indexing lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    IndexingStarted {
        full: bool,
    },
    IndexingCompleted {
        full: bool,
        elapsed: Duration,
        report: ScanReport,
    },
    IndexingFailed {
        full: bool,
        message: String,
    },
}

/// Owns the scanner and the domain indexers for one project.
pub struct Engine {
    cache: ProjectCache,
    scanner: Arc<Scanner>,
    components: Arc<ComponentsIndexer>,
    templates: Arc<TemplatesIndexer>,
    services: Arc<ServicesIndexer>,
    snippets: Arc<SnippetsIndexer>,
    theme: Arc<ThemeIndexer>,
    system_config: Arc<SystemConfigIndexer>,
    extensions: Arc<ExtensionsIndexer>,
    events: broadcast::Sender<EngineEvent>,
    needs_rebuild: bool,
}

impl Engine {
    /// Open the cache for `project_root`, checking its index version, and
    /// register every domain indexer with a new scanner.
    pub fn open(project_root: &Path, config: &LoupeConfig) -> Result<Self, CoreError> {
        let cache = ProjectCache::open(config, project_root)?;
        let needs_rebuild = cache.ensure_version()?;

        let components = Arc::new(ComponentsIndexer::open(&cache.dir)?);
        let templates = Arc::new(TemplatesIndexer::open(&cache.dir)?);
        let services = Arc::new(ServicesIndexer::open(&cache.dir)?);
        let snippets = Arc::new(SnippetsIndexer::open(&cache.dir)?);
        let theme = Arc::new(ThemeIndexer::open(&cache.dir)?);
        let system_config = Arc::new(SystemConfigIndexer::open(&cache.dir)?);
        let extensions = Arc::new(ExtensionsIndexer::open(&cache.dir)?);

        let scanner = Scanner::new(&cache.root, &cache.dir, config.scan_options())?;
        scanner.add_indexer(services.clone());
        scanner.add_indexer(components.clone());
        scanner.add_indexer(templates.clone());
        scanner.add_indexer(snippets.clone());
        scanner.add_indexer(theme.clone());
        scanner.add_indexer(system_config.clone());
        scanner.add_indexer(extensions.clone());

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            root = ?cache.root,
            cache = ?cache.dir,
            indexers = ?scanner.indexer_ids(),
            needs_rebuild,
            "Engine ready"
        );

        Ok(Self {
            cache,
            scanner: Arc::new(scanner),
            components,
            templates,
            services,
            snippets,
            theme,
            system_config,
            extensions,
            events,
            needs_rebuild,
        })
    }

    pub fn root(&self) -> &Path {
        &self.cache.root
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache.dir
    }

    /// Whether the cache was wiped on open and needs a forced full scan.
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn components(&self) -> &ComponentsIndexer {
        &self.components
    }

    pub fn templates(&self) -> &TemplatesIndexer {
        &self.templates
    }

    pub fn services(&self) -> &ServicesIndexer {
        &self.services
    }

    pub fn snippets(&self) -> &SnippetsIndexer {
        &self.snippets
    }

    pub fn theme(&self) -> &ThemeIndexer {
        &self.theme
    }

    pub fn system_config(&self) -> &SystemConfigIndexer {
        &self.system_config
    }

    pub fn extensions(&self) -> &ExtensionsIndexer {
        &self.extensions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Scan the whole project on a blocking task.
    pub fn spawn_index_all(&self, force: bool) -> JoinHandle<Result<ScanReport, CoreError>> {
        let scanner = self.scanner.clone();
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || run(&events, true, || scanner.index_all(force)))
    }

    /// Reindex the given files on a blocking task.
    pub fn spawn_index_files(&self, paths: Vec<PathBuf>) -> JoinHandle<Result<ScanReport, CoreError>> {
        let scanner = self.scanner.clone();
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || run(&events, false, || scanner.index_files(&paths)))
    }

    /// Drop the facts of the given files on a blocking task.
    pub fn spawn_remove_files(&self, paths: Vec<PathBuf>) -> JoinHandle<Result<ScanReport, CoreError>> {
        let scanner = self.scanner.clone();
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || run(&events, false, || scanner.remove_files(&paths)))
    }

    /// Close the scanner, which closes every registered store.
    pub fn shutdown(&self) -> Result<(), CoreError> {
        self.scanner.close()?;
        info!(root = ?self.cache.root, "Engine shut down");
        Ok(())
    }
}

fn run<F>(events: &broadcast::Sender<EngineEvent>, full: bool, work: F) -> Result<ScanReport, CoreError>
where
    F: FnOnce() -> Result<ScanReport, IndexerError>,
{
    // send only fails when nobody is subscribed
    let _ = events.send(EngineEvent::IndexingStarted { full });
    let start = Instant::now();

    match work() {
        Ok(report) => {
            let _ = events.send(EngineEvent::IndexingCompleted {
                full,
                elapsed: start.elapsed(),
                report: report.clone(),
            });
            Ok(report)
        }
        Err(e) => {
            error!(full, error = %e, "Indexing failed");
            let _ = events.send(EngineEvent::IndexingFailed {
                full,
                message: e.to_string(),
            });
            Err(e.into())
        }
    }
}

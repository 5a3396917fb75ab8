//! Project file discovery.

use crate::grammar::detect_file_type;
use ignore::{WalkBuilder, WalkState};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::{mpsc, Arc};
use tracing::debug;

/// Directory names that are never scanned.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "node_modules",
    "var",
    "vendor-bin",
    "bin",
    "cache",
    ".git",
    ".github",
    ".gitlab",
    ".run",
    ".idea",
    ".vscode",
    "tests",
    "public",
];

/// Set of directory names excluded from scanning.
#[derive(Debug, Clone)]
pub struct SkipDirs {
    names: HashSet<String>,
}

impl SkipDirs {
    /// The default names plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> = DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect();
        names.extend(extra.into_iter().map(Into::into));
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether any directory of `path` below `root` is skipped.
    pub fn excludes(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let Some(dir) = relative.parent() else {
            return false;
        };
        dir.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(|n| self.contains(n)),
            _ => false,
        })
    }
}

impl Default for SkipDirs {
    fn default() -> Self {
        Self::with_extra(Vec::<String>::new())
    }
}

/// A discovered file entry.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Walks a project and yields every file with a known grammar.
///
/// VCS ignore files are not consulted: dependencies under `vendor/` carry
/// templates and components that overrides resolve against.
pub struct Walker {
    root: PathBuf,
    skip_dirs: Arc<SkipDirs>,
    follow_symlinks: bool,
}

impl Walker {
    pub fn new(root: &Path, skip_dirs: SkipDirs, follow_symlinks: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            skip_dirs: Arc::new(skip_dirs),
            follow_symlinks,
        }
    }

    /// Walk the directory tree. Entries are sorted by path.
    pub fn walk(&self) -> Vec<FileEntry> {
        let (tx, rx) = mpsc::channel();
        let skip_dirs = Arc::clone(&self.skip_dirs);

        let walker = WalkBuilder::new(&self.root)
            .follow_links(self.follow_symlinks)
            .standard_filters(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry.file_name().to_str().is_some_and(|n| skip_dirs.contains(n)))
            })
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            Box::new(move |result| {
                match result {
                    Ok(entry) => {
                        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
                        if is_file && detect_file_type(entry.path()).is_some() {
                            if let Ok(metadata) = entry.metadata() {
                                let _ = tx.send(FileEntry {
                                    path: entry.path().to_path_buf(),
                                    size: metadata.len(),
                                });
                            }
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Walk error");
                    }
                }
                WalkState::Continue
            })
        });

        drop(tx);

        let mut entries: Vec<FileEntry> = rx.into_iter().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(root = ?self.root, count = entries.len(), "Walk complete");
        entries
    }
}

//! The contract every domain indexer implements.

use crate::syntax::SyntaxTree;
use crate::IndexerError;
use std::path::{Path, PathBuf};

/// Turns parsed files into persisted facts for one feature area.
///
/// The scanner calls [`index`](Self::index) only for files that
/// [`accepts`](Self::accepts) returns true for, but implementations still
/// treat an unrelated path as a no-op. Each `index` call saves the file's
/// complete fact set; partial saves are not allowed.
pub trait DomainIndexer: Send + Sync {
    /// Unique, stable identifier.
    fn id(&self) -> &'static str;

    /// Cheap path/file-type filter.
    fn accepts(&self, path: &Path) -> bool;

    /// Extract and store the facts of one parsed file.
    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError>;

    /// Drop every fact the given files own.
    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError>;

    /// Release owned stores.
    fn close(&self) -> Result<(), IndexerError>;

    /// Remove every stored fact.
    fn clear(&self) -> Result<(), IndexerError>;
}

/// Normalized path text with forward slashes, for path-pattern checks.
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

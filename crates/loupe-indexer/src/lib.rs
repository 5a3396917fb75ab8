//! Loupe Indexer
//!
//! The incremental indexing engine behind loupe:
//! - Owned syntax trees with tree-sitter and in-house grammars
//! - Declarative pattern matching over syntax trees
//! - Persistent, file-scoped multi-value fact stores
//! - The domain indexer contract and the hash-driven scanner that feeds it
//! - File watching with debounced change batches

mod error;
pub mod grammar;
pub mod indexer;
pub mod pattern;
pub mod scanner;
pub mod store;
pub mod syntax;
pub mod watcher;

pub use error::IndexerError;
pub use grammar::{detect_file_type, FileType, Parser};
pub use indexer::DomainIndexer;
pub use pattern::Pattern;
pub use scanner::{ScanOptions, ScanReport, ScanState, Scanner, TrackedFile};
pub use store::{FactStore, FileFacts};
pub use syntax::{Node, Point, SyntaxTree};
pub use watcher::{ChangeBatcher, ChangeKind, FileChange, FileWatcher, WatcherOptions};

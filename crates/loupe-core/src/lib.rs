//! Loupe Core Components
//!
//! This crate wires the indexing engine together for the daemon and CLI:
//! configuration, the per-project cache directory, and the [`Engine`] that
//! owns the scanner and every domain indexer.

mod cache;
mod config;
mod engine;
mod error;

pub use cache::{ProjectCache, INDEX_VERSION};
pub use config::LoupeConfig;
pub use engine::{Engine, EngineEvent};
pub use error::CoreError;

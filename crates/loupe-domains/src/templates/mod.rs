//! Twig templates: inheritance, blocks and block version markers.
//!
//! An overriding block may carry a marker comment recording the hash of the
//! upstream block it was copied from:
//!
//! ```text
//! {# shopware-block: 3f5a...@6.6.0.0 #}
//! {% block base_header %}...{% endblock %}
//! ```
//!
//! [`TemplatesIndexer::check_drift`] compares markers against the current
//! upstream hashes.

mod drift;
mod parse;

pub use drift::{Diagnostic, DiagnosticKind};

use crate::ADMINISTRATION_DIR;
use loupe_indexer::grammar::twig;
use loupe_indexer::indexer::slash_path;
use loupe_indexer::{DomainIndexer, FactStore, FileFacts, IndexerError, SyntaxTree};
use parse::parse_template;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths containing any of these are never indexed as templates.
const EXCLUDED_PATHS: &[&str] = &[ADMINISTRATION_DIR, "Migration/Fixtures", ".phpdoc/template"];

/// A `{# shopware-block: <hash>@<version> #}` comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub hash: String,
    pub version: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBlock {
    pub name: String,
    pub line: usize,
    /// SHA-256 of the block's full text, tags included
    pub hash: String,
    pub marker: Option<VersionMarker>,
}

/// One indexed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub path: String,
    /// Path after `Resources/views/`, as used in `extends` tags
    pub relative_path: String,
    pub bundle_name: String,
    pub extends: Option<String>,
    pub extends_line: Option<usize>,
    pub blocks: Vec<TemplateBlock>,
}

/// A block definition, keyed by block name in `blocks.db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHash {
    pub name: String,
    pub relative_path: String,
    pub absolute_path: String,
    pub hash: String,
    pub line: usize,
}

/// Render a version marker line for `hash` at `version`.
pub fn format_marker(hash: &str, version: &str) -> String {
    format!("{{# shopware-block: {hash}@{version} #}}\n")
}

/// Indexes `.twig` files into `templates.db` and `blocks.db`.
pub struct TemplatesIndexer {
    templates: FactStore<TemplateFile>,
    blocks: FactStore<BlockHash>,
}

impl TemplatesIndexer {
    pub const ID: &'static str = "twig.templates";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        Ok(Self {
            templates: FactStore::open(cache_dir.join("templates.db"))?,
            blocks: FactStore::open(cache_dir.join("blocks.db"))?,
        })
    }

    /// Every template indexed under a relative path.
    pub fn get_templates(&self, relative_path: &str) -> Result<Vec<TemplateFile>, IndexerError> {
        self.templates.get_values(relative_path)
    }

    pub fn get_template_paths(&self) -> Result<Vec<String>, IndexerError> {
        self.templates.get_all_keys()
    }

    /// Every definition of a block name, across all templates.
    pub fn get_block_hashes(&self, name: &str) -> Result<Vec<BlockHash>, IndexerError> {
        self.blocks.get_values(name)
    }

    pub fn get_block_hash_by_path(
        &self,
        name: &str,
        relative_path: &str,
    ) -> Result<Option<BlockHash>, IndexerError> {
        Ok(self
            .blocks
            .get_values(name)?
            .into_iter()
            .find(|b| b.relative_path == relative_path))
    }

    pub fn get_block_names(&self) -> Result<Vec<String>, IndexerError> {
        self.blocks.get_all_keys()
    }

    /// Drift diagnostics for a template, parsed from `source` as it is now.
    ///
    /// Each block with an upstream original on the template's `extends` chain
    /// is checked: a marker with a different hash reports
    /// [`DiagnosticKind::Drift`], no marker reports
    /// [`DiagnosticKind::MissingMarker`]. Blocks with no upstream original are
    /// local and produce nothing.
    pub fn check_drift(&self, path: &Path, source: &str) -> Result<Vec<Diagnostic>, IndexerError> {
        let tree = twig::parse(source);
        let file = parse_template(path, tree.root(), source);
        let diagnostics = drift::check_file(&file, |relative| self.templates.get_values(relative))?;
        debug!(path = ?path, count = diagnostics.len(), "Checked block drift");
        Ok(diagnostics)
    }
}

impl DomainIndexer for TemplatesIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        let is_twig = path.extension().is_some_and(|ext| ext == "twig");
        if !is_twig {
            return false;
        }
        let slashed = slash_path(path);
        !EXCLUDED_PATHS.iter().any(|p| slashed.contains(p))
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        if !self.accepts(path) {
            return Ok(());
        }

        let file = parse_template(path, tree.root(), source);
        let blocks: FileFacts<BlockHash> = file
            .blocks
            .iter()
            .map(|block| {
                (
                    block.name.clone(),
                    BlockHash {
                        name: block.name.clone(),
                        relative_path: file.relative_path.clone(),
                        absolute_path: file.path.clone(),
                        hash: block.hash.clone(),
                        line: block.line,
                    },
                )
            })
            .collect();
        debug!(path = ?path, relative = %file.relative_path, blocks = blocks.len(), "Indexed template");

        self.templates
            .batch_save_items(&[(path, vec![(file.relative_path.clone(), file)])])?;
        self.blocks.batch_save_items(&[(path, blocks)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.templates.batch_delete_by_file_paths(paths)?;
        self.blocks.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.templates.close()?;
        self.blocks.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.templates.clear()?;
        self.blocks.clear()
    }
}

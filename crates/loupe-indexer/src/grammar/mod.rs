//! File type detection and grammar dispatch.

pub mod twig;

use crate::syntax::{SyntaxTree, TreeBuilder};
use crate::IndexerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// File types the engine knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Twig,
    JavaScript,
    TypeScript,
    Json,
    Xml,
}

impl FileType {
    /// Get the display name for this file type.
    pub fn name(&self) -> &'static str {
        match self {
            FileType::Twig => "Twig",
            FileType::JavaScript => "JavaScript",
            FileType::TypeScript => "TypeScript",
            FileType::Json => "JSON",
            FileType::Xml => "XML",
        }
    }

    /// Whether the grammar is backed by tree-sitter.
    pub fn uses_tree_sitter(&self) -> bool {
        !matches!(self, FileType::Twig)
    }

    fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            // TS grammar handles plain JS too
            FileType::JavaScript | FileType::TypeScript => {
                Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            }
            FileType::Json => Some(tree_sitter_json::LANGUAGE.into()),
            FileType::Xml => Some(tree_sitter_xml::LANGUAGE_XML.into()),
            FileType::Twig => None,
        }
    }
}

/// Detect the file type of a path based on its extension.
pub fn detect_file_type(path: &Path) -> Option<FileType> {
    let name = path.file_name()?.to_str()?.to_lowercase();
    if name.ends_with(".phar.php") {
        return None;
    }

    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "twig" => Some(FileType::Twig),
        "js" | "mjs" | "cjs" => Some(FileType::JavaScript),
        "ts" => Some(FileType::TypeScript),
        "json" => Some(FileType::Json),
        "xml" => Some(FileType::Xml),
        _ => None,
    }
}

/// Parses source files into [`SyntaxTree`]s.
///
/// Tree-sitter parsers are created on demand per file type and reused for
/// later files. A `Parser` is not shared between threads; each scanner worker
/// owns one.
#[derive(Default)]
pub struct Parser {
    parsers: HashMap<FileType, tree_sitter::Parser>,
}

impl Parser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, choosing the grammar from the path.
    pub fn parse_path(&mut self, path: &Path, source: &str) -> Result<SyntaxTree, IndexerError> {
        let file_type = detect_file_type(path)
            .ok_or_else(|| IndexerError::UnsupportedFileType(path.to_path_buf()))?;
        self.parse(path, file_type, source)
    }

    /// Parse `source` with the grammar for `file_type`.
    pub fn parse(
        &mut self,
        path: &Path,
        file_type: FileType,
        source: &str,
    ) -> Result<SyntaxTree, IndexerError> {
        let Some(language) = file_type.tree_sitter_language() else {
            return Ok(twig::parse(source));
        };

        let parser = match self.parsers.entry(file_type) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut parser = tree_sitter::Parser::new();
                parser
                    .set_language(&language)
                    .map_err(|e| IndexerError::Parse {
                        path: path.to_path_buf(),
                        message: format!("Failed to set language: {}", e),
                    })?;
                entry.insert(parser)
            }
        };

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| IndexerError::Parse {
                path: path.to_path_buf(),
                message: "Failed to parse content".to_string(),
            })?;

        let tree = TreeBuilder::from_tree_sitter(&tree);
        debug!(path = ?path, file_type = file_type.name(), nodes = tree.len(), "Parsed file");
        Ok(tree)
    }
}

//! App extensions declared by `manifest.xml`.

use crate::xml::{attribute, child_elements, element_name, root_element, text_content};
use loupe_indexer::{DomainIndexer, FactStore, IndexerError, Node, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const MANIFEST_FILE: &str = "manifest.xml";

/// Path segments that mark test code.
const TEST_DIRS: [&str; 5] = ["tests", "test", "fixtures", "_fixture", "_fixtures"];

/// An app described by the `<meta>` block of its manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    pub label: String,
    pub description: String,
    pub author: String,
    pub copyright: String,
    pub version: String,
    pub license: String,
    /// Directory holding the manifest
    pub path: String,
}

impl Extension {
    /// Where the app keeps its storefront templates.
    pub fn storefront_views_path(&self) -> PathBuf {
        Path::new(&self.path).join("src/Resources/views")
    }
}

/// Read the `<meta>` block of a `<manifest>` document.
pub(crate) fn parse_manifest(root: Node<'_>, source: &str) -> Option<Extension> {
    let manifest = root_element(root, "manifest", source)?;
    let meta = child_elements(manifest).find(|e| element_name(*e, source) == Some("meta"))?;

    let mut extension = Extension::default();
    let mut localized_label = None;
    for element in child_elements(meta) {
        let value = text_content(element, source);
        match element_name(element, source) {
            Some("name") => extension.name = value,
            Some("label") if attribute(element, "lang", source).is_some() => {
                localized_label.get_or_insert(value);
            }
            Some("label") => extension.label = value,
            Some("description") if extension.description.is_empty() => extension.description = value,
            Some("author") => extension.author = value,
            Some("copyright") => extension.copyright = value,
            Some("version") => extension.version = value,
            Some("license") => extension.license = value,
            _ => {}
        }
    }
    if extension.label.is_empty() {
        extension.label = localized_label.unwrap_or_default();
    }
    Some(extension)
}

fn is_indexable_manifest(path: &Path) -> bool {
    if !path.file_name().is_some_and(|name| name == MANIFEST_FILE) {
        return false;
    }
    !path.components().any(|part| match part {
        Component::Normal(name) => {
            TEST_DIRS.contains(&name.to_string_lossy().to_lowercase().as_str())
        }
        _ => false,
    })
}

/// Indexes app manifests into `extensions.db`, keyed by app name.
pub struct ExtensionsIndexer {
    extensions: FactStore<Extension>,
}

impl ExtensionsIndexer {
    pub const ID: &'static str = "extensions";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        Ok(Self {
            extensions: FactStore::open(cache_dir.join("extensions.db"))?,
        })
    }

    /// First extension registered under `name`.
    pub fn get_extension(&self, name: &str) -> Result<Option<Extension>, IndexerError> {
        Ok(self.extensions.get_values(name)?.into_iter().next())
    }

    pub fn get_extension_names(&self) -> Result<Vec<String>, IndexerError> {
        self.extensions.get_all_keys()
    }

    pub fn get_all_extensions(&self) -> Result<Vec<Extension>, IndexerError> {
        self.extensions.get_all_values()
    }
}

impl DomainIndexer for ExtensionsIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        is_indexable_manifest(path)
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        if !self.accepts(path) {
            return Ok(());
        }

        let facts = parse_manifest(tree.root(), source)
            .filter(|app| !app.name.is_empty())
            .map(|mut app| {
                app.path = path
                    .parent()
                    .map(|dir| dir.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!(path = ?path, name = %app.name, "Indexed app manifest");
                vec![(app.name.clone(), app)]
            })
            .unwrap_or_default();

        self.extensions.batch_save_items(&[(path, facts)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.extensions.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.extensions.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.extensions.clear()
    }
}

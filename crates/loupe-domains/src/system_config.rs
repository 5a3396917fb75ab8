//! Plugin and app configuration fields from `config.xml`.
//!
//! Every field is keyed by its namespace plus its name, e.g.
//! `DemoPlugin.config.apiKey`. The namespace comes from the nearest
//! `composer.json` (the short name of `extra.shopware-plugin-class` plus
//! `.config`) or `manifest.xml` (the app name) above the file, and falls back
//! to `core.<file stem>`.

use crate::extensions::{parse_manifest, MANIFEST_FILE};
use crate::text::line_of;
use crate::xml::{attribute, child_elements, element_name, element_named, text_content};
use loupe_indexer::indexer::slash_path;
use loupe_indexer::pattern::{find_all, Pattern};
use loupe_indexer::{DomainIndexer, FactStore, FileFacts, IndexerError, Node, Parser, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Marker of the system config schema in a document.
const SCHEMA: &str = "SystemConfig/Schema/config.xsd";

static FIELD: LazyLock<Pattern> = LazyLock::new(|| element_named(["input-field", "component"]));

/// One `<input-field>` or `<component>` of a config card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfigEntry {
    pub namespace: String,
    pub name: String,
    /// Label without a `lang` attribute
    pub label: String,
    /// `type` attribute of an input field
    pub field_type: Option<String>,
    /// `name` attribute of a component
    pub component: Option<String>,
    /// Title of the enclosing card
    pub card: Option<String>,
    pub path: String,
    pub line: usize,
}

impl SystemConfigEntry {
    /// Store key: `<namespace>.<name>`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

#[derive(Deserialize)]
struct Composer {
    #[serde(default)]
    extra: ComposerExtra,
}

#[derive(Default, Deserialize)]
struct ComposerExtra {
    #[serde(rename = "shopware-plugin-class", default)]
    plugin_class: String,
}

/// Resolve the config namespace of `path` from the filesystem.
pub fn namespace_for(path: &Path) -> Result<String, IndexerError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let fallback = format!("core.{stem}");

    for dir in path.ancestors().skip(1) {
        let composer = dir.join("composer.json");
        if composer.is_file() {
            let composer: Composer = serde_json::from_slice(&std::fs::read(&composer)?)?;
            let class = composer.extra.plugin_class;
            return Ok(match class.rsplit('\\').next() {
                Some(plugin) if !plugin.is_empty() => format!("{plugin}.config"),
                _ => fallback,
            });
        }

        let manifest = dir.join(MANIFEST_FILE);
        if manifest.is_file() {
            let source = std::fs::read_to_string(&manifest)?;
            let tree = Parser::new().parse_path(&manifest, &source)?;
            return Ok(parse_manifest(tree.root(), &source)
                .map(|app| app.name)
                .filter(|name| !name.is_empty())
                .unwrap_or(fallback));
        }
    }
    Ok(fallback)
}

/// Every named field of a config document, in document order.
pub(crate) fn parse_fields(root: Node<'_>, source: &str, namespace: &str, file: &str) -> Vec<SystemConfigEntry> {
    find_all(root, &FIELD, source)
        .into_iter()
        .filter_map(|element| {
            let name = first_child_text(element, &["name", "n"], source)?;
            let is_component = element_name(element, source) == Some("component");
            Some(SystemConfigEntry {
                namespace: namespace.to_string(),
                name,
                label: label(element, source).unwrap_or_default(),
                field_type: (!is_component).then(|| attribute(element, "type", source)).flatten(),
                component: is_component.then(|| attribute(element, "name", source)).flatten(),
                card: card_title(element, source),
                path: file.to_string(),
                line: line_of(element),
            })
        })
        .collect()
}

fn first_child_text(element: Node<'_>, names: &[&str], source: &str) -> Option<String> {
    child_elements(element)
        .find(|child| element_name(*child, source).is_some_and(|n| names.contains(&n)))
        .map(|child| text_content(child, source))
        .filter(|text| !text.is_empty())
}

/// The first `<label>` without a `lang` attribute.
fn label(element: Node<'_>, source: &str) -> Option<String> {
    child_elements(element)
        .find(|child| {
            element_name(*child, source) == Some("label")
                && attribute(*child, "lang", source).is_none()
        })
        .map(|child| text_content(child, source))
}

fn card_title(element: Node<'_>, source: &str) -> Option<String> {
    let mut current = element.parent();
    while let Some(node) = current {
        if node.kind() == "element" && element_name(node, source) == Some("card") {
            return child_elements(node)
                .find(|child| {
                    element_name(*child, source) == Some("title")
                        && attribute(*child, "lang", source).is_none()
                })
                .map(|child| text_content(child, source));
        }
        current = node.parent();
    }
    None
}

/// Indexes system config documents into `system_config.db`.
pub struct SystemConfigIndexer {
    entries: FactStore<SystemConfigEntry>,
}

impl SystemConfigIndexer {
    pub const ID: &'static str = "system.config";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        Ok(Self {
            entries: FactStore::open(cache_dir.join("system_config.db"))?,
        })
    }

    /// Entries stored under a qualified name like `DemoPlugin.config.apiKey`.
    pub fn get_entry(&self, key: &str) -> Result<Vec<SystemConfigEntry>, IndexerError> {
        self.entries.get_values(key)
    }

    pub fn get_entry_keys(&self) -> Result<Vec<String>, IndexerError> {
        self.entries.get_all_keys()
    }

    pub fn get_all_entries(&self) -> Result<Vec<SystemConfigEntry>, IndexerError> {
        self.entries.get_all_values()
    }
}

impl DomainIndexer for SystemConfigIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        let slashed = slash_path(path);
        slashed.ends_with(".xml") && !slashed.contains("/_fixtures/") && !slashed.contains("/_fixture/")
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        if !self.accepts(path) {
            return Ok(());
        }

        let mut facts: FileFacts<SystemConfigEntry> = Vec::new();
        if source.contains(SCHEMA) {
            let namespace = namespace_for(path)?;
            let file = path.to_string_lossy();
            facts = parse_fields(tree.root(), source, &namespace, &file)
                .into_iter()
                .map(|entry| (entry.qualified_name(), entry))
                .collect();
            debug!(path = ?path, namespace = %namespace, count = facts.len(), "Indexed system config");
        }

        self.entries.batch_save_items(&[(path, facts)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.entries.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.entries.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.entries.clear()
    }
}

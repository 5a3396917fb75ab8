//! Theme configuration fields from `theme.json`.

use crate::text::{line_of, string_literal};
use loupe_indexer::pattern::{ancestor, and, find_all, has_child, kind, text, Pattern};
use loupe_indexer::{DomainIndexer, FactStore, FileFacts, IndexerError, Node, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Each `config.fields.<key>` object of the top-level document object.
static FIELD: LazyLock<Pattern> = LazyLock::new(|| {
    let config = member("config", kind("document"));
    let fields = member("fields", config);
    and([kind("pair"), has_child(kind("object")), ancestor(fields, 2)])
});

/// A pair keyed `key` holding an object, inside an object owned by `parent`.
fn member(key: &str, parent: Pattern) -> Pattern {
    and([
        kind("pair"),
        has_child(and([kind("string"), text(format!("\"{key}\""))])),
        has_child(kind("object")),
        // pair -> object -> parent
        ancestor(parent, 2),
    ])
}

/// One entry of `config.fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeConfigField {
    pub key: String,
    /// Label per locale
    pub label: BTreeMap<String, String>,
    pub field_type: Option<String>,
    pub value: Option<String>,
    pub editable: bool,
    pub block: Option<String>,
    pub order: Option<i64>,
    /// Whether the field is exposed as an SCSS variable
    pub scss: bool,
    pub path: String,
    pub line: usize,
}

/// Indexes `theme.json` files into `theme_config.db`.
pub struct ThemeIndexer {
    fields: FactStore<ThemeConfigField>,
}

impl ThemeIndexer {
    pub const ID: &'static str = "theme.config";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        Ok(Self {
            fields: FactStore::open(cache_dir.join("theme_config.db"))?,
        })
    }

    pub fn get_field(&self, key: &str) -> Result<Vec<ThemeConfigField>, IndexerError> {
        self.fields.get_values(key)
    }

    pub fn get_field_keys(&self) -> Result<Vec<String>, IndexerError> {
        self.fields.get_all_keys()
    }

    pub fn get_all_fields(&self) -> Result<Vec<ThemeConfigField>, IndexerError> {
        self.fields.get_all_values()
    }
}

impl DomainIndexer for ThemeIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == "theme.json")
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        if !self.accepts(path) {
            return Ok(());
        }

        let file = path.to_string_lossy();
        let fields: FileFacts<ThemeConfigField> = find_all(tree.root(), &FIELD, source)
            .into_iter()
            .filter_map(|pair| parse_field(pair, source, &file))
            .collect();
        debug!(path = ?path, count = fields.len(), "Indexed theme config");

        self.fields.batch_save_items(&[(path, fields)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.fields.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.fields.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.fields.clear()
    }
}

/// Key and value nodes of each `pair` in a JSON object.
fn pairs<'t>(
    object: Node<'t>,
    source: &'t str,
) -> impl Iterator<Item = (Node<'t>, String, Node<'t>)> + 't {
    object
        .named_children()
        .filter(|n| n.kind() == "pair")
        .filter_map(move |pair| {
            let key = pair.named_child(0).filter(|k| k.kind() == "string")?;
            let value = pair.named_child(1)?;
            Some((pair, string_literal(key, source), value))
        })
}

fn parse_field(pair: Node<'_>, source: &str, file: &str) -> Option<(String, ThemeConfigField)> {
    let key = string_literal(pair.named_child(0)?, source);
    let options = pair.named_child(1)?;
    let mut field = ThemeConfigField {
        key: key.clone(),
        label: BTreeMap::new(),
        field_type: None,
        value: None,
        editable: false,
        block: None,
        order: None,
        scss: true,
        path: file.to_string(),
        line: line_of(pair),
    };

    for (_, option, value) in pairs(options, source) {
        match (option.as_str(), value.kind()) {
            ("label", "object") => {
                field.label = pairs(value, source)
                    .filter(|(_, _, text)| text.kind() == "string")
                    .map(|(_, locale, text)| (locale, string_literal(text, source)))
                    .collect();
            }
            ("type", "string") => field.field_type = Some(string_literal(value, source)),
            ("value", "string") => field.value = Some(string_literal(value, source)),
            ("block", "string") => field.block = Some(string_literal(value, source)),
            ("editable", "true" | "false") => field.editable = value.kind() == "true",
            ("scss", "true" | "false") => field.scss = value.kind() == "true",
            ("order", "number") => field.order = value.text(source).parse().ok(),
            _ => {}
        }
    }

    Some((key, field))
}

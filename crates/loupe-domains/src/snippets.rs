//! Translation snippets from JSON files.
//!
//! Nested objects flatten into dotted keys:
//!
//! ```json
//! { "checkout": { "cart": { "title": "Cart" } } }
//! ```
//!
//! yields `checkout.cart.title`.

use crate::text::{line_of, string_literal};
use crate::ADMINISTRATION_DIR;
use loupe_indexer::indexer::slash_path;
use loupe_indexer::pattern::{ancestor, and, find_all, has_child, kind, not, Pattern};
use loupe_indexer::{DomainIndexer, FactStore, FileFacts, IndexerError, Node, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// A pair holding a scalar, outside any array.
static ENTRY: LazyLock<Pattern> = LazyLock::new(|| {
    and([
        kind("pair"),
        not(has_child(kind("object"))),
        not(ancestor(kind("array"), usize::MAX)),
    ])
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub key: String,
    pub text: String,
    pub file: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnippetKind {
    Storefront,
    Admin,
}

fn snippet_kind(path: &Path) -> Option<SnippetKind> {
    let slashed = slash_path(path);
    if slashed.contains("/_fixtures/") || !slashed.ends_with(".json") {
        return None;
    }
    if slashed.contains("/Resources/snippet/") {
        return Some(SnippetKind::Storefront);
    }
    let in_admin = slashed.contains(&format!("/{ADMINISTRATION_DIR}/"));
    let in_snippet_dir = path
        .parent()
        .and_then(|dir| dir.file_name())
        .is_some_and(|name| name == "snippet");
    (in_admin && in_snippet_dir).then_some(SnippetKind::Admin)
}

/// Indexes snippet files into `storefront_snippets.db` and
/// `admin_snippets.db`.
pub struct SnippetsIndexer {
    storefront: FactStore<Snippet>,
    admin: FactStore<Snippet>,
}

impl SnippetsIndexer {
    pub const ID: &'static str = "snippets";

    pub fn open(cache_dir: &Path) -> Result<Self, IndexerError> {
        Ok(Self {
            storefront: FactStore::open(cache_dir.join("storefront_snippets.db"))?,
            admin: FactStore::open(cache_dir.join("admin_snippets.db"))?,
        })
    }

    pub fn get_storefront_snippet(&self, key: &str) -> Result<Vec<Snippet>, IndexerError> {
        self.storefront.get_values(key)
    }

    pub fn get_storefront_keys(&self) -> Result<Vec<String>, IndexerError> {
        self.storefront.get_all_keys()
    }

    pub fn get_all_storefront_snippets(&self) -> Result<Vec<Snippet>, IndexerError> {
        self.storefront.get_all_values()
    }

    pub fn get_admin_snippet(&self, key: &str) -> Result<Vec<Snippet>, IndexerError> {
        self.admin.get_values(key)
    }

    pub fn get_admin_keys(&self) -> Result<Vec<String>, IndexerError> {
        self.admin.get_all_keys()
    }

    pub fn get_all_admin_snippets(&self) -> Result<Vec<Snippet>, IndexerError> {
        self.admin.get_all_values()
    }
}

impl DomainIndexer for SnippetsIndexer {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn accepts(&self, path: &Path) -> bool {
        snippet_kind(path).is_some()
    }

    fn index(&self, path: &Path, tree: &SyntaxTree, source: &str) -> Result<(), IndexerError> {
        let Some(kind) = snippet_kind(path) else {
            return Ok(());
        };

        let file = path.to_string_lossy();
        let snippets: FileFacts<Snippet> = find_all(tree.root(), &ENTRY, source)
            .into_iter()
            .filter_map(|pair| entry(pair, source, &file))
            .collect();
        debug!(path = ?path, kind = ?kind, count = snippets.len(), "Indexed snippets");

        let store = match kind {
            SnippetKind::Storefront => &self.storefront,
            SnippetKind::Admin => &self.admin,
        };
        store.batch_save_items(&[(path, snippets)])
    }

    fn removed_files(&self, paths: &[PathBuf]) -> Result<(), IndexerError> {
        self.storefront.batch_delete_by_file_paths(paths)?;
        self.admin.batch_delete_by_file_paths(paths)
    }

    fn close(&self) -> Result<(), IndexerError> {
        self.storefront.close()?;
        self.admin.close()
    }

    fn clear(&self) -> Result<(), IndexerError> {
        self.storefront.clear()?;
        self.admin.clear()
    }
}

fn entry(pair: Node<'_>, source: &str, file: &str) -> Option<(String, Snippet)> {
    let value = pair.named_child(1)?;
    let text = match value.kind() {
        "string" => string_literal(value, source),
        "number" | "true" | "false" | "null" => value.text(source).to_string(),
        _ => return None,
    };
    let key = dotted_key(pair, source)?;
    Some((
        key.clone(),
        Snippet {
            key,
            text,
            file: file.to_string(),
            line: line_of(pair),
        },
    ))
}

/// Keys of `pair` and every enclosing pair, joined with dots.
fn dotted_key(pair: Node<'_>, source: &str) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = Some(pair);
    while let Some(node) = current {
        if node.kind() == "pair" {
            let key = node.named_child(0).filter(|k| k.kind() == "string")?;
            parts.push(string_literal(key, source));
        }
        current = node.parent();
    }
    parts.reverse();
    Some(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_indexer::Parser;
    use tempfile::tempdir;

    const STOREFRONT: &str = "/p/src/Resources/snippet/en_GB/storefront.en-GB.json";
    const ADMIN: &str = "/p/src/Resources/app/administration/src/module/sw-foo/snippet/en-GB.json";

    fn index(indexer: &SnippetsIndexer, path: &str, source: &str) {
        let path = Path::new(path);
        let tree = Parser::new().parse_path(path, source).unwrap();
        indexer.index(path, &tree, source).unwrap();
    }

    #[test]
    fn test_snippet_kind() {
        assert_eq!(snippet_kind(Path::new(STOREFRONT)), Some(SnippetKind::Storefront));
        assert_eq!(snippet_kind(Path::new(ADMIN)), Some(SnippetKind::Admin));
        assert_eq!(
            snippet_kind(Path::new("/p/Resources/snippet/_fixtures/a.json")),
            None
        );
        assert_eq!(
            snippet_kind(Path::new("/p/Resources/app/administration/package.json")),
            None
        );
        assert_eq!(snippet_kind(Path::new("/p/composer.json")), None);
    }

    #[test]
    fn test_nested_keys_flatten() {
        let dir = tempdir().unwrap();
        let indexer = SnippetsIndexer::open(dir.path()).unwrap();
        index(
            &indexer,
            STOREFRONT,
            "{\n  \"checkout\": {\n    \"cart\": {\n      \"title\": \"Cart\",\n      \"count\": 3\n    }\n  },\n  \"empty\": {}\n}",
        );

        assert_eq!(
            indexer.get_storefront_keys().unwrap(),
            vec!["checkout.cart.title", "checkout.cart.count"]
        );
        let title = &indexer.get_storefront_snippet("checkout.cart.title").unwrap()[0];
        assert_eq!(title.text, "Cart");
        assert_eq!(title.line, 4);
        assert_eq!(
            indexer.get_storefront_snippet("checkout.cart.count").unwrap()[0].text,
            "3"
        );
        assert!(indexer.get_admin_keys().unwrap().is_empty());
    }

    #[test]
    fn test_values_inside_arrays_are_skipped() {
        let dir = tempdir().unwrap();
        let indexer = SnippetsIndexer::open(dir.path()).unwrap();
        index(
            &indexer,
            STOREFRONT,
            r#"{"list": [{"hidden": "x"}], "flag": true, "note": null}"#,
        );

        assert_eq!(indexer.get_storefront_keys().unwrap(), vec!["flag", "note"]);
    }

    #[test]
    fn test_admin_snippets_use_their_own_store() {
        let dir = tempdir().unwrap();
        let indexer = SnippetsIndexer::open(dir.path()).unwrap();
        index(&indexer, ADMIN, r#"{"sw-foo": {"general": {"title": "Foo"}}}"#);

        assert_eq!(indexer.get_admin_keys().unwrap(), vec!["sw-foo.general.title"]);
        assert!(indexer.get_storefront_keys().unwrap().is_empty());

        indexer.removed_files(&[PathBuf::from(ADMIN)]).unwrap();
        assert!(indexer.get_all_admin_snippets().unwrap().is_empty());
    }
}

//! Block and inheritance extraction from Twig syntax trees.

use super::{TemplateBlock, TemplateFile, VersionMarker};
use crate::text::{line_of, unquote};
use loupe_indexer::indexer::slash_path;
use loupe_indexer::pattern::{ancestor, and, any_text, find_all, find_first, has_child, kind, Pattern};
use loupe_indexer::Node;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{#\s*shopware-block:\s*([a-f0-9]+)@([\w.\-]+)\s*#\}")
        .unwrap_or_else(|_| unreachable!("marker pattern is valid"))
});

/// A named `{% block %}` at any depth.
static BLOCK: LazyLock<Pattern> =
    LazyLock::new(|| and([kind("block"), has_child(kind("identifier"))]));

/// A top-level `{% extends %}` or `{% sw_extends %}` tag with a string target.
static EXTENDS_TAG: LazyLock<Pattern> = LazyLock::new(|| {
    and([
        kind("tag"),
        ancestor(kind("template"), 1),
        has_child(and([kind("name"), any_text(["extends", "sw_extends"])])),
        has_child(kind("string")),
    ])
});

const VIEWS_DIR: &str = "Resources/views";

/// Build the [`TemplateFile`] record for a parsed template.
pub(crate) fn parse_template(path: &Path, root: Node<'_>, source: &str) -> TemplateFile {
    let slashed = slash_path(path);
    let mut file = TemplateFile {
        path: path.to_string_lossy().into_owned(),
        relative_path: relative_template_path(&slashed),
        bundle_name: bundle_name(&slashed),
        extends: None,
        extends_line: None,
        blocks: Vec::new(),
    };

    let mut seen = HashSet::new();
    for block in find_all(root, &BLOCK, source) {
        let Some(name) = block.child_of_kind("identifier") else {
            continue;
        };
        let name_text = name.text(source);
        if !seen.insert(name_text) {
            continue;
        }
        file.blocks.push(TemplateBlock {
            name: name_text.to_string(),
            line: line_of(name),
            hash: block_hash(block.text(source)),
            marker: version_marker(block, source),
        });
    }

    if let Some(tag) = find_first(root, &EXTENDS_TAG, source) {
        if let Some(target) = tag.child_of_kind("string") {
            file.extends = Some(unquote(target.text(source)).to_string());
            file.extends_line = Some(line_of(tag));
        }
    }

    file
}

/// SHA-256 hex digest of a block's full source text.
pub(crate) fn block_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// The marker comment attached to `block`: the nearest preceding sibling
/// comment mentioning `shopware-block:`, unless another block comes first.
fn version_marker(block: Node<'_>, source: &str) -> Option<VersionMarker> {
    let mut sibling = block.prev_named_sibling();
    while let Some(node) = sibling {
        match node.kind() {
            "block" => return None,
            "comment" if node.text(source).contains("shopware-block:") => {
                return parse_marker(node.text(source), line_of(node));
            }
            _ => sibling = node.prev_named_sibling(),
        }
    }
    None
}

pub(crate) fn parse_marker(comment: &str, line: usize) -> Option<VersionMarker> {
    let captures = MARKER.captures(comment)?;
    Some(VersionMarker {
        hash: captures[1].to_string(),
        version: captures[2].to_string(),
        line,
    })
}

/// Path used to reference a template: the part after `Resources/views/`.
pub(crate) fn relative_template_path(path: &str) -> String {
    match path.find(VIEWS_DIR) {
        Some(index) => path[index + VIEWS_DIR.len()..]
            .trim_start_matches('/')
            .to_string(),
        None => path.trim_start_matches('/').to_string(),
    }
}

/// Directory that owns `Resources`, skipping a `src` level.
pub(crate) fn bundle_name(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let Some(resources) = parts.iter().rposition(|p| *p == "Resources") else {
        return String::new();
    };
    parts[..resources]
        .iter()
        .rev()
        .find(|p| !p.is_empty() && **p != "src")
        .map(|p| p.to_string())
        .unwrap_or_default()
}

/// Reference form of an extends target: `@Storefront/storefront/base.html.twig`
/// becomes `storefront/base.html.twig`.
pub(crate) fn normalize_template_reference(reference: &str) -> &str {
    match reference.strip_prefix('@') {
        Some(rest) => rest.split_once('/').map_or(rest, |(_, path)| path),
        None => reference.trim_start_matches('/'),
    }
}

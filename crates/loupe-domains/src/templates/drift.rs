//! Stale-override detection for version-marked blocks.

use super::parse::normalize_template_reference;
use super::TemplateFile;
use loupe_indexer::IndexerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Hash characters shown in messages.
const SHORT_HASH: usize = 12;

fn short(hash: &str) -> &str {
    hash.get(..SHORT_HASH).unwrap_or(hash)
}

/// A finding about one overriding block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub block: String,
    /// One-based line the finding points at: the marker for drift, the block
    /// otherwise
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The upstream block changed since the marker was written.
    Drift {
        expected: String,
        actual: String,
        source: String,
    },
    /// An upstream original exists but the override has no marker.
    MissingMarker { source: String },
}

impl Diagnostic {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::Drift {
                expected,
                actual,
                source,
            } => write!(
                f,
                "upstream block '{}' changed (expected: {}, got: {}, source: {source})",
                self.block,
                short(expected),
                short(actual)
            ),
            DiagnosticKind::MissingMarker { .. } => {
                write!(f, "block '{}' has no version marker", self.block)
            }
        }
    }
}

/// Where a block was first defined on an inheritance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Original {
    pub(crate) hash: String,
    pub(crate) relative_path: String,
}

/// Check every block of `file` against the original it overrides.
///
/// `lookup` returns the indexed templates for a relative path.
pub(crate) fn check_file<F>(file: &TemplateFile, mut lookup: F) -> Result<Vec<Diagnostic>, IndexerError>
where
    F: FnMut(&str) -> Result<Vec<TemplateFile>, IndexerError>,
{
    let mut diagnostics = Vec::new();
    if file.extends.is_none() {
        return Ok(diagnostics);
    }

    for block in &file.blocks {
        let Some(original) = find_original(file, &block.name, &mut lookup)? else {
            continue;
        };

        match &block.marker {
            Some(marker) if marker.hash != original.hash => diagnostics.push(Diagnostic {
                block: block.name.clone(),
                line: marker.line,
                kind: DiagnosticKind::Drift {
                    expected: original.hash,
                    actual: marker.hash.clone(),
                    source: original.relative_path,
                },
            }),
            Some(_) => {}
            None => diagnostics.push(Diagnostic {
                block: block.name.clone(),
                line: block.line,
                kind: DiagnosticKind::MissingMarker {
                    source: original.relative_path,
                },
            }),
        }
    }

    Ok(diagnostics)
}

/// Walk the `extends` chain upward from `file` and return the nearest
/// template that defines `block`, starting at the extends target.
///
/// Only templates reachable through the chain are considered, so a same-named
/// block in an unrelated template family never matches. Each file is visited
/// at most once; when several files share a relative path the first one not
/// yet visited is followed.
pub(crate) fn find_original<F>(
    file: &TemplateFile,
    block: &str,
    lookup: &mut F,
) -> Result<Option<Original>, IndexerError>
where
    F: FnMut(&str) -> Result<Vec<TemplateFile>, IndexerError>,
{
    let mut visited = HashSet::from([file.path.clone()]);
    let mut target = file.extends.clone();

    while let Some(reference) = target.take() {
        let relative = normalize_template_reference(&reference);
        let Some(parent) = lookup(relative)?
            .into_iter()
            .find(|candidate| !visited.contains(&candidate.path))
        else {
            break;
        };

        if let Some(defined) = parent.blocks.iter().find(|b| b.name == block) {
            return Ok(Some(Original {
                hash: defined.hash.clone(),
                relative_path: parent.relative_path,
            }));
        }
        visited.insert(parent.path);
        target = parent.extends;
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{TemplateBlock, VersionMarker};
    use std::collections::HashMap;

    fn template(path: &str, relative: &str, extends: Option<&str>, blocks: &[(&str, &str)]) -> TemplateFile {
        TemplateFile {
            path: path.to_string(),
            relative_path: relative.to_string(),
            bundle_name: String::new(),
            extends: extends.map(str::to_string),
            extends_line: extends.map(|_| 1),
            blocks: blocks
                .iter()
                .enumerate()
                .map(|(i, (name, hash))| TemplateBlock {
                    name: name.to_string(),
                    line: i + 2,
                    hash: hash.to_string(),
                    marker: None,
                })
                .collect(),
        }
    }

    fn lookup_in(
        files: Vec<TemplateFile>,
    ) -> impl FnMut(&str) -> Result<Vec<TemplateFile>, IndexerError> {
        let mut by_path: HashMap<String, Vec<TemplateFile>> = HashMap::new();
        for file in files {
            by_path.entry(file.relative_path.clone()).or_default().push(file);
        }
        move |relative| Ok(by_path.get(relative).cloned().unwrap_or_default())
    }

    fn marked(mut file: TemplateFile, block: &str, hash: &str) -> TemplateFile {
        for b in &mut file.blocks {
            if b.name == block {
                b.marker = Some(VersionMarker {
                    hash: hash.to_string(),
                    version: "6.6.0.0".to_string(),
                    line: b.line - 1,
                });
            }
        }
        file
    }

    #[test]
    fn test_matching_marker_is_clean_and_changed_upstream_drifts() {
        let upstream = template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("content", "H1")]);
        let over = marked(
            template(
                "/theme/base.html.twig",
                "storefront/base.html.twig",
                Some("@Storefront/storefront/base.html.twig"),
                &[("content", "X")],
            ),
            "content",
            "H1",
        );

        let clean = check_file(&over, lookup_in(vec![upstream, over.clone()])).unwrap();
        assert!(clean.is_empty());

        let changed = template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("content", "H2")]);
        let drift = check_file(&over, lookup_in(vec![changed, over.clone()])).unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(
            drift[0].message(),
            "upstream block 'content' changed (expected: H2, got: H1, source: storefront/base.html.twig)"
        );
        assert_eq!(drift[0].line, 1);
    }

    #[test]
    fn test_missing_marker() {
        let upstream = template("/sf/page.html.twig", "storefront/page.html.twig", None, &[("page_main", "H")]);
        let over = template(
            "/theme/page.html.twig",
            "storefront/page.html.twig",
            Some("@Storefront/storefront/page.html.twig"),
            &[("page_main", "Y")],
        );

        let diagnostics = check_file(&over, lookup_in(vec![upstream])).unwrap();
        assert_eq!(
            diagnostics,
            vec![Diagnostic {
                block: "page_main".to_string(),
                line: 2,
                kind: DiagnosticKind::MissingMarker {
                    source: "storefront/page.html.twig".to_string()
                },
            }]
        );
        assert_eq!(diagnostics[0].message(), "block 'page_main' has no version marker");
    }

    #[test]
    fn test_new_block_is_locally_original() {
        let upstream = template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("content", "H")]);
        let over = template(
            "/theme/base.html.twig",
            "storefront/base.html.twig",
            Some("@Storefront/storefront/base.html.twig"),
            &[("theme_banner", "B")],
        );
        assert!(check_file(&over, lookup_in(vec![upstream])).unwrap().is_empty());
    }

    #[test]
    fn test_unrelated_family_does_not_match() {
        // same block name, different template family
        let unrelated = template("/sf/account.html.twig", "storefront/account.html.twig", None, &[("content", "A")]);
        let parent = template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("header", "H")]);
        let over = template(
            "/theme/base.html.twig",
            "storefront/base.html.twig",
            Some("@Storefront/storefront/base.html.twig"),
            &[("content", "X")],
        );

        let diagnostics = check_file(&over, lookup_in(vec![unrelated, parent])).unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_chain_resolves_to_nearest_definition() {
        let root = template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("content", "ROOT")]);
        let layout = template(
            "/sf/layout.html.twig",
            "storefront/layout.html.twig",
            Some("@Storefront/storefront/base.html.twig"),
            &[("content", "MID")],
        );
        let page = template(
            "/theme/page.html.twig",
            "storefront/page.html.twig",
            Some("@Storefront/storefront/layout.html.twig"),
            &[("content", "X")],
        );

        let mut lookup = lookup_in(vec![root, layout]);
        let original = find_original(&page, "content", &mut lookup).unwrap().unwrap();
        assert_eq!(original.hash, "MID");
        assert_eq!(original.relative_path, "storefront/layout.html.twig");

        // only the root defines it
        let mut lookup = lookup_in(vec![
            template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("content", "ROOT")]),
            template(
                "/sf/layout.html.twig",
                "storefront/layout.html.twig",
                Some("@Storefront/storefront/base.html.twig"),
                &[("header", "H")],
            ),
        ]);
        let original = find_original(&page, "content", &mut lookup).unwrap().unwrap();
        assert_eq!(original.hash, "ROOT");
    }

    #[test]
    fn test_cycle_terminates() {
        let a = template("/a.html.twig", "a.html.twig", Some("b.html.twig"), &[("x", "A")]);
        let b = template("/b.html.twig", "b.html.twig", Some("a.html.twig"), &[("x", "B")]);
        let start = template("/c.html.twig", "c.html.twig", Some("a.html.twig"), &[("x", "C")]);

        let mut lookup = lookup_in(vec![a, b]);
        let original = find_original(&start, "x", &mut lookup).unwrap().unwrap();
        assert_eq!(original.hash, "A");

        // neither defines the block, so the walk must stop on its own
        let missing = find_original(&start, "y", &mut lookup).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_marker_matching_redefining_parent_is_clean() {
        let base = template("/sf/base.html.twig", "storefront/base.html.twig", None, &[("content", "BASE")]);
        let index = template(
            "/sf/page/index.html.twig",
            "storefront/page/index.html.twig",
            Some("@Storefront/storefront/base.html.twig"),
            &[("content", "INDEX")],
        );
        let over = marked(
            template(
                "/theme/page/index.html.twig",
                "storefront/page/index.html.twig",
                Some("@Storefront/storefront/page/index.html.twig"),
                &[("content", "X")],
            ),
            "content",
            "INDEX",
        );

        let diagnostics = check_file(&over, lookup_in(vec![base, index, over.clone()])).unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_drift_message_shortens_hashes() {
        let diagnostic = Diagnostic {
            block: "content".to_string(),
            line: 3,
            kind: DiagnosticKind::Drift {
                expected: "0123456789abcdef0123".to_string(),
                actual: "fedcba9876543210fedc".to_string(),
                source: "storefront/base.html.twig".to_string(),
            },
        };
        assert_eq!(
            diagnostic.to_string(),
            "upstream block 'content' changed (expected: 0123456789ab, got: fedcba987654, source: storefront/base.html.twig)"
        );
    }
}

//! Declarative predicates over syntax-tree nodes.
//!
//! A [`Pattern`] is an immutable predicate tree. Build one from the small
//! constructor functions in this module and evaluate it with
//! [`Pattern::matches`], [`find_first`] or [`find_all`]:
//!
//! ```ignore
//! use loupe_indexer::pattern::{and, any_text, has_child, kind};
//!
//! let register_call = and([
//!     kind("call_expression"),
//!     has_child(and([
//!         kind("member_expression"),
//!         any_text(["Component.register", "Shopware.Component.register"]),
//!     ])),
//! ]);
//! let calls = find_all(tree.root(), &register_call, source);
//! ```

use crate::syntax::Node;
use std::borrow::Cow;

type Text = Cow<'static, str>;

/// A predicate over a node and the source it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// The node's kind equals the value.
    KindEquals(Text),
    /// The node's kind is one of the values.
    AnyOfKind(Vec<Text>),
    /// The node's source text equals the value.
    TextEquals(Text),
    /// The node's source text starts with the value.
    TextPrefix(Text),
    /// The node's source text contains the value.
    TextContains(Text),
    /// Some direct named child matches.
    HasChild(Box<Pattern>),
    /// Some ancestor within `max_depth` hops matches. The node itself is not
    /// its own ancestor.
    Ancestor(Box<Pattern>, usize),
    /// Every inner pattern matches. Stops at the first failure.
    And(Vec<Pattern>),
    /// Any inner pattern matches. Stops at the first success.
    Or(Vec<Pattern>),
    /// The inner pattern does not match.
    Not(Box<Pattern>),
}

impl Pattern {
    /// Evaluate the pattern against a single node.
    pub fn matches(&self, node: Node<'_>, source: &str) -> bool {
        match self {
            Pattern::KindEquals(kind) => node.kind() == kind.as_ref(),
            Pattern::AnyOfKind(kinds) => kinds.iter().any(|k| node.kind() == k.as_ref()),
            Pattern::TextEquals(text) => node.text(source) == text.as_ref(),
            Pattern::TextPrefix(prefix) => node.text(source).starts_with(prefix.as_ref()),
            Pattern::TextContains(needle) => node.text(source).contains(needle.as_ref()),
            Pattern::HasChild(inner) => node.named_children().any(|c| inner.matches(c, source)),
            Pattern::Ancestor(inner, max_depth) => {
                let mut current = node.parent();
                let mut depth = 0;
                while let Some(ancestor) = current {
                    if depth >= *max_depth {
                        break;
                    }
                    if inner.matches(ancestor, source) {
                        return true;
                    }
                    current = ancestor.parent();
                    depth += 1;
                }
                false
            }
            Pattern::And(inner) => inner.iter().all(|p| p.matches(node, source)),
            Pattern::Or(inner) => inner.iter().any(|p| p.matches(node, source)),
            Pattern::Not(inner) => !inner.matches(node, source),
        }
    }
}

/// Match a node's kind.
pub fn kind(kind: impl Into<Text>) -> Pattern {
    Pattern::KindEquals(kind.into())
}

/// Match any of the node kinds.
pub fn any_kind<I, S>(kinds: I) -> Pattern
where
    I: IntoIterator<Item = S>,
    S: Into<Text>,
{
    Pattern::AnyOfKind(kinds.into_iter().map(Into::into).collect())
}

/// Match a node's exact text.
pub fn text(text: impl Into<Text>) -> Pattern {
    Pattern::TextEquals(text.into())
}

/// Match a node whose text equals any of the values.
pub fn any_text<I, S>(texts: I) -> Pattern
where
    I: IntoIterator<Item = S>,
    S: Into<Text>,
{
    Pattern::Or(texts.into_iter().map(|t| text(t)).collect())
}

/// Match a node whose text starts with `prefix`.
pub fn text_prefix(prefix: impl Into<Text>) -> Pattern {
    Pattern::TextPrefix(prefix.into())
}

/// Match a node whose text contains `needle`.
pub fn text_contains(needle: impl Into<Text>) -> Pattern {
    Pattern::TextContains(needle.into())
}

/// Match a node with a direct named child matching `pattern`.
pub fn has_child(pattern: Pattern) -> Pattern {
    Pattern::HasChild(Box::new(pattern))
}

/// Match a node with an ancestor matching `pattern` at most `max_depth` hops up.
pub fn ancestor(pattern: Pattern, max_depth: usize) -> Pattern {
    Pattern::Ancestor(Box::new(pattern), max_depth)
}

pub fn and(patterns: impl IntoIterator<Item = Pattern>) -> Pattern {
    Pattern::And(patterns.into_iter().collect())
}

pub fn or(patterns: impl IntoIterator<Item = Pattern>) -> Pattern {
    Pattern::Or(patterns.into_iter().collect())
}

pub fn not(pattern: Pattern) -> Pattern {
    Pattern::Not(Box::new(pattern))
}

/// First node matching `pattern`, searching `root` and its named descendants
/// in pre-order.
pub fn find_first<'t>(root: Node<'t>, pattern: &Pattern, source: &str) -> Option<Node<'t>> {
    root.descendants().find(|node| pattern.matches(*node, source))
}

/// Every node matching `pattern` in document order. Matches nested inside
/// other matches are included.
pub fn find_all<'t>(root: Node<'t>, pattern: &Pattern, source: &str) -> Vec<Node<'t>> {
    root.descendants()
        .filter(|node| pattern.matches(*node, source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{SyntaxTree, TreeBuilder};

    // call_expression
    //   member_expression  "Component.register"
    //   arguments
    //     string  "'a'"
    //       string_fragment  "a"
    //     ( anonymous
    fn call_tree() -> (SyntaxTree, &'static str) {
        let source = "Component.register('a')";
        let mut b = TreeBuilder::new(source);
        b.open("call_expression", true, 0);
        b.leaf("member_expression", true, 0..18);
        b.open("arguments", true, 18);
        b.leaf("(", false, 18..19);
        b.open("string", true, 19);
        b.leaf("string_fragment", true, 20..21);
        b.close(22);
        b.leaf(")", false, 22..23);
        b.close(23);
        b.close(23);
        (b.finish(), source)
    }

    fn node_of_kind<'t>(tree: &'t SyntaxTree, kind_name: &str) -> Node<'t> {
        tree.root()
            .descendants()
            .find(|n| n.kind() == kind_name)
            .unwrap()
    }

    #[test]
    fn test_kind_and_text() {
        let (tree, source) = call_tree();
        let member = node_of_kind(&tree, "member_expression");

        assert!(kind("member_expression").matches(member, source));
        assert!(!kind("call_expression").matches(member, source));
        assert!(text("Component.register").matches(member, source));
        assert!(text_prefix("Component.").matches(member, source));
        assert!(!text_prefix("Shopware.").matches(member, source));
        assert!(text_contains(".reg").matches(member, source));
        assert!(any_kind(["identifier", "member_expression"]).matches(member, source));
        assert!(any_text(["x", "Component.register"]).matches(member, source));
    }

    #[test]
    fn test_has_child_only_direct_children() {
        let (tree, source) = call_tree();
        let root = tree.root();

        assert!(has_child(kind("arguments")).matches(root, source));
        // string is a grandchild
        assert!(!has_child(kind("string")).matches(root, source));
        // anonymous children are not considered
        let args = node_of_kind(&tree, "arguments");
        assert!(!has_child(kind("(")).matches(args, source));
    }

    #[test]
    fn test_ancestor_depth_window() {
        let (tree, source) = call_tree();
        let fragment = node_of_kind(&tree, "string_fragment");

        // fragment -> string (1) -> arguments (2) -> call_expression (3)
        assert!(ancestor(kind("string"), 1).matches(fragment, source));
        assert!(!ancestor(kind("arguments"), 1).matches(fragment, source));
        assert!(ancestor(kind("call_expression"), 3).matches(fragment, source));
        assert!(!ancestor(kind("call_expression"), 2).matches(fragment, source));
        // a node is not its own ancestor
        assert!(!ancestor(kind("string_fragment"), 5).matches(fragment, source));
        assert!(!ancestor(kind("string"), 0).matches(fragment, source));
    }

    #[test]
    fn test_composition() {
        let (tree, source) = call_tree();
        let root = tree.root();

        let p = and([
            kind("call_expression"),
            has_child(and([kind("member_expression"), text("Component.register")])),
        ]);
        assert!(p.matches(root, source));
        assert!(!and([kind("call_expression"), not(has_child(kind("arguments")))])
            .matches(root, source));
        assert!(or([kind("nope"), kind("call_expression")]).matches(root, source));
        assert!(!or(Vec::new()).matches(root, source));
        assert!(and(Vec::new()).matches(root, source));
    }

    #[test]
    fn test_find_first_pre_order() {
        let (tree, source) = call_tree();
        let found = find_first(tree.root(), &any_kind(["string", "string_fragment"]), source);
        assert_eq!(found.unwrap().kind(), "string");

        assert!(find_first(tree.root(), &kind("missing"), source).is_none());
    }

    #[test]
    fn test_find_first_includes_root() {
        let (tree, source) = call_tree();
        let found = find_first(tree.root(), &kind("call_expression"), source).unwrap();
        assert_eq!(found, tree.root());
    }

    #[test]
    fn test_find_all_document_order_with_nested_matches() {
        let (tree, source) = call_tree();
        let found = find_all(tree.root(), &text_contains("'a'"), source);
        let kinds: Vec<_> = found.iter().map(|n| n.kind()).collect();

        assert_eq!(kinds, vec!["call_expression", "arguments", "string"]);
    }

    #[test]
    fn test_patterns_are_reusable() {
        let (tree, source) = call_tree();
        let p = kind("string");
        assert_eq!(find_all(tree.root(), &p, source).len(), 1);
        assert_eq!(find_all(tree.root(), &p, source).len(), 1);
    }
}

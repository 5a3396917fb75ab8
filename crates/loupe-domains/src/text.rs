//! Small helpers for reading literal values out of syntax nodes.

use loupe_indexer::Node;

/// Content of a quoted string node.
///
/// JavaScript strings carry a `string_fragment` child and JSON strings a
/// `string_content` child; anything else has its quotes trimmed.
pub(crate) fn string_literal(node: Node<'_>, source: &str) -> String {
    node.children()
        .find(|c| matches!(c.kind(), "string_fragment" | "string_content"))
        .map(|c| c.text(source).to_string())
        .unwrap_or_else(|| unquote(node.text(source)).to_string())
}

/// Strip one layer of matching quotes.
pub(crate) fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// One-based line of a node's first byte.
pub(crate) fn line_of(node: Node<'_>) -> usize {
    node.start_position().line()
}

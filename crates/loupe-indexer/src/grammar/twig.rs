//! A small Twig parser.
//!
//! Produces a tree with these node kinds:
//!
//! - `template`: the root
//! - `content`: literal text with at least one non-whitespace character
//! - `comment`: `{# ... #}`
//! - `output`: `{{ ... }}`
//! - `tag`: any `{% ... %}` other than blocks, with a `name` child followed by
//!   `string` and `identifier` argument children
//! - `block`: `{% block name %} ... {% endblock %}`, with an `identifier` child
//!   for the name and the nested nodes as further children. Shorthand blocks
//!   (`{% block title 'Shop' %}`) close immediately.
//!
//! Unterminated delimiters and blocks without `endblock` are flagged as errors.

use crate::syntax::{SyntaxTree, TreeBuilder};
use std::ops::Range;

/// Parse Twig source into a [`SyntaxTree`].
pub fn parse(source: &str) -> SyntaxTree {
    let mut builder = TreeBuilder::new(source);
    builder.open("template", true, 0);

    let bytes = source.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(start) = find_delimiter(bytes, pos) else {
            push_content(&mut builder, source, pos..bytes.len());
            break;
        };
        push_content(&mut builder, source, pos..start);

        pos = match bytes[start + 1] {
            b'#' => close_simple(&mut builder, source, start, "#}", "comment"),
            b'{' => close_simple(&mut builder, source, start, "}}", "output"),
            _ => parse_statement(&mut builder, source, start),
        };
    }

    // Blocks still open here never saw their endblock
    while builder.depth() > 1 {
        if let Some(id) = builder.close(source.len()) {
            builder.mark_error(id);
        }
    }
    builder.close(source.len());
    builder.finish()
}

fn find_delimiter(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len().saturating_sub(1))
        .find(|&i| bytes[i] == b'{' && matches!(bytes[i + 1], b'{' | b'%' | b'#'))
}

fn push_content(builder: &mut TreeBuilder, source: &str, range: Range<usize>) {
    if source[range.clone()].chars().any(|c| !c.is_whitespace()) {
        builder.leaf("content", true, range);
    }
}

fn close_simple(
    builder: &mut TreeBuilder,
    source: &str,
    start: usize,
    terminator: &str,
    kind: &'static str,
) -> usize {
    match source[start + 2..].find(terminator) {
        Some(offset) => {
            let end = start + 2 + offset + terminator.len();
            builder.leaf(kind, true, start..end);
            end
        }
        None => {
            let id = builder.leaf(kind, true, start..source.len());
            builder.mark_error(id);
            source.len()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Identifier,
    String,
    Other,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    range: Range<usize>,
}

/// Find the end of a `{% ... %}` statement, skipping quoted strings.
fn statement_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'%' && bytes.get(i + 1) == Some(&b'}') => return Some(i + 2),
            None => {}
        }
        i += 1;
    }
    None
}

fn tokenize(source: &str, range: Range<usize>) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = range.start;

    while i < range.end {
        let b = bytes[i];
        if b.is_ascii_whitespace() || b == b'-' {
            i += 1;
        } else if b == b'\'' || b == b'"' {
            let start = i;
            i += 1;
            while i < range.end && bytes[i] != b {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(range.end);
            tokens.push(Token {
                kind: TokenKind::String,
                range: start..i,
            });
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < range.end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Identifier,
                range: start..i,
            });
        } else {
            let start = i;
            i += source[i..].chars().next().map_or(1, char::len_utf8);
            tokens.push(Token {
                kind: TokenKind::Other,
                range: start..i,
            });
        }
    }

    tokens
}

fn parse_statement(builder: &mut TreeBuilder, source: &str, start: usize) -> usize {
    let Some(end) = statement_end(source.as_bytes(), start + 2) else {
        let id = builder.leaf("tag", true, start..source.len());
        builder.mark_error(id);
        return source.len();
    };

    let tokens = tokenize(source, start + 2..end - 2);
    let name = tokens
        .first()
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| &source[t.range.clone()]);

    match name {
        Some("block") => {
            let block_name = tokens
                .get(1)
                .filter(|t| t.kind == TokenKind::Identifier)
                .cloned();
            let has_inline_body = tokens.len() > 2;

            builder.open("block", true, start);
            if let Some(token) = block_name {
                builder.leaf("identifier", true, token.range);
            }
            if has_inline_body {
                push_arguments(builder, &tokens[2..]);
                builder.close(end);
            }
        }
        Some("endblock") => {
            if builder.current_kind() == Some("block") {
                builder.leaf("endblock", false, start..end);
                builder.close(end);
            } else {
                let id = builder.leaf("ERROR", true, start..end);
                builder.mark_error(id);
            }
        }
        _ => {
            builder.open("tag", true, start);
            if let Some(first) = tokens.first().filter(|t| t.kind == TokenKind::Identifier) {
                builder.leaf("name", true, first.range.clone());
                push_arguments(builder, &tokens[1..]);
            } else {
                push_arguments(builder, &tokens);
            }
            builder.close(end);
        }
    }

    end
}

fn push_arguments(builder: &mut TreeBuilder, tokens: &[Token]) {
    for token in tokens {
        match token.kind {
            TokenKind::Identifier => {
                builder.leaf("identifier", true, token.range.clone());
            }
            TokenKind::String => {
                builder.leaf("string", true, token.range.clone());
            }
            TokenKind::Other => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tree: &SyntaxTree) -> Vec<&'static str> {
        tree.root().named_children().map(|n| n.kind()).collect()
    }

    #[test]
    fn test_extends_tag() {
        let source = "{% sw_extends '@Storefront/storefront/base.html.twig' %}\n";
        let tree = parse(source);
        let tag = tree.root().named_child(0).unwrap();

        assert_eq!(tag.kind(), "tag");
        assert_eq!(tag.named_child(0).unwrap().text(source), "sw_extends");
        assert_eq!(
            tag.named_child(1).unwrap().text(source),
            "'@Storefront/storefront/base.html.twig'"
        );
        assert!(!tree.has_error());
    }

    #[test]
    fn test_nested_blocks() {
        let source = "{% block outer %}<div>{% block inner %}x{% endblock %}</div>{% endblock %}";
        let tree = parse(source);
        let outer = tree.root().named_child(0).unwrap();

        assert_eq!(outer.kind(), "block");
        assert_eq!(outer.text(source), source);
        assert_eq!(outer.named_child(0).unwrap().text(source), "outer");

        let inner = outer
            .named_children()
            .find(|n| n.kind() == "block")
            .unwrap();
        assert_eq!(inner.named_child(0).unwrap().text(source), "inner");
        assert_eq!(
            inner.text(source),
            "{% block inner %}x{% endblock %}"
        );
        assert!(!tree.has_error());
    }

    #[test]
    fn test_comment_precedes_block() {
        let source = "{# shopware-block: abc@6.5 #}\n{% block a %}{% endblock %}";
        let tree = parse(source);
        assert_eq!(kinds(&tree), vec!["comment", "block"]);

        let block = tree.root().named_child(1).unwrap();
        let comment = block.prev_named_sibling().unwrap();
        assert_eq!(comment.text(source), "{# shopware-block: abc@6.5 #}");
        assert_eq!(block.start_position().row, 1);
    }

    #[test]
    fn test_shorthand_block_closes_immediately() {
        let source = "{% block title 'Shop' %}<p>after</p>";
        let tree = parse(source);
        assert_eq!(kinds(&tree), vec!["block", "content"]);
        assert!(!tree.has_error());
    }

    #[test]
    fn test_whitespace_control() {
        let source = "{%- block a -%}x{%- endblock -%}";
        let tree = parse(source);
        let block = tree.root().named_child(0).unwrap();
        assert_eq!(block.named_child(0).unwrap().text(source), "a");
        assert_eq!(block.end_byte(), source.len());
    }

    #[test]
    fn test_output_and_strings_with_delimiters() {
        let source = "{{ 'a %} b'|trans }}{% set x = '%}' %}";
        let tree = parse(source);
        assert_eq!(kinds(&tree), vec!["output", "tag"]);
        assert!(!tree.has_error());
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let tree = parse("{% block a %}text");
        assert!(tree.has_error());
        let block = tree.root().named_child(0).unwrap();
        assert!(block.is_error());
    }

    #[test]
    fn test_stray_endblock_is_error() {
        let tree = parse("{% endblock %}");
        assert!(tree.has_error());
    }

    #[test]
    fn test_unterminated_comment_is_error() {
        let tree = parse("{# never closed");
        assert!(tree.has_error());
    }

    #[test]
    fn test_whitespace_only_content_is_dropped() {
        let tree = parse("  \n  {% block a %}{% endblock %}\n");
        assert_eq!(kinds(&tree), vec!["block"]);
    }
}

//! Element and attribute access over tree-sitter-xml trees.

use loupe_indexer::pattern::{ancestor, and, any_kind, any_text, find_first, has_child, kind, Pattern};
use loupe_indexer::Node;

/// An element whose tag name is one of `names`.
pub(crate) fn element_named<const N: usize>(names: [&'static str; N]) -> Pattern {
    and([
        kind("element"),
        has_child(and([
            any_kind(["STag", "EmptyElemTag"]),
            has_child(and([kind("Name"), any_text(names)])),
        ])),
    ])
}

/// An element named one of `names` whose parent element is named one of
/// `parents`. Elements nested deeper never match.
pub(crate) fn child_element_named<const N: usize, const M: usize>(
    names: [&'static str; N],
    parents: [&'static str; M],
) -> Pattern {
    // element -> content -> parent element
    and([element_named(names), ancestor(element_named(parents), 2)])
}

/// The document's root element, when it is named `name`.
pub(crate) fn root_element<'t>(root: Node<'t>, name: &'static str, source: &str) -> Option<Node<'t>> {
    let pattern = and([element_named([name]), ancestor(kind("document"), 1)]);
    find_first(root, &pattern, source)
}

fn start_tag(element: Node<'_>) -> Option<Node<'_>> {
    element
        .named_child(0)
        .filter(|tag| matches!(tag.kind(), "STag" | "EmptyElemTag"))
}

pub(crate) fn element_name<'s>(element: Node<'_>, source: &'s str) -> Option<&'s str> {
    Some(start_tag(element)?.child_of_kind("Name")?.text(source))
}

/// Unquoted value of the attribute `name`.
pub(crate) fn attribute(element: Node<'_>, name: &str, source: &str) -> Option<String> {
    start_tag(element)?
        .named_children()
        .filter(|n| n.kind() == "Attribute")
        .find(|attr| {
            attr.child_of_kind("Name")
                .is_some_and(|n| n.text(source) == name)
        })
        .and_then(|attr| attr.child_of_kind("AttValue"))
        .map(|value| value.text(source).trim_matches(['"', '\'']).to_string())
}

/// Direct child elements, in document order.
pub(crate) fn child_elements<'t>(element: Node<'t>) -> impl Iterator<Item = Node<'t>> + 't {
    element
        .child_of_kind("content")
        .into_iter()
        .flat_map(|content| content.named_children().filter(|n| n.kind() == "element"))
}

/// Trimmed character data of an element, or an empty string.
pub(crate) fn text_content(element: Node<'_>, source: &str) -> String {
    element
        .child_of_kind("content")
        .map(|content| content.text(source).trim().to_string())
        .unwrap_or_default()
}

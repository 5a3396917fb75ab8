//! Owned syntax trees shared by every grammar.
//!
//! Grammars are free to produce trees however they like (tree-sitter,
//! hand-written parsers); domain indexers only ever see a [`SyntaxTree`]
//! and navigate it through lightweight [`Node`] handles.

mod builder;

pub use builder::TreeBuilder;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Index of a node inside its tree's arena.
pub type NodeId = usize;

/// Zero-based row/column position. Columns count bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// One-based line number, as shown in editors.
    pub fn line(&self) -> usize {
        self.row + 1
    }
}

/// Arena entry for one node.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: &'static str,
    pub(crate) named: bool,
    pub(crate) error: bool,
    pub(crate) start_byte: usize,
    pub(crate) end_byte: usize,
    pub(crate) start: Point,
    pub(crate) end: Point,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// A parsed file: an arena of typed, positioned nodes.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    pub(crate) fn from_parts(nodes: Vec<NodeData>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    /// Get the root node.
    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: self.root,
        }
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        (id < self.nodes.len()).then_some(Node { tree: self, id })
    }

    /// Total number of nodes, named and anonymous.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any node in the tree is an error or missing node.
    pub fn has_error(&self) -> bool {
        self.nodes.iter().any(|n| n.error)
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id]
    }
}

/// A borrowed handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    fn data(&self) -> &'t NodeData {
        self.tree.data(self.id)
    }

    /// Grammar-specific node type, e.g. `call_expression` or `block`.
    pub fn kind(&self) -> &'static str {
        self.data().kind
    }

    /// Named nodes carry meaning; anonymous nodes are punctuation and keywords.
    pub fn is_named(&self) -> bool {
        self.data().named
    }

    pub fn is_error(&self) -> bool {
        self.data().error
    }

    pub fn start_byte(&self) -> usize {
        self.data().start_byte
    }

    pub fn end_byte(&self) -> usize {
        self.data().end_byte
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte()..self.end_byte()
    }

    pub fn start_position(&self) -> Point {
        self.data().start
    }

    pub fn end_position(&self) -> Point {
        self.data().end
    }

    /// Source text covered by this node. Empty if the range does not fall on
    /// character boundaries of `source`.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.byte_range()).unwrap_or("")
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| Node {
            tree: self.tree,
            id,
        })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.data().children.get(index).map(|&id| Node {
            tree: self.tree,
            id,
        })
    }

    /// All direct children, including anonymous ones.
    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    /// Direct children that are named.
    pub fn named_children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        self.children().filter(|n| n.is_named())
    }

    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    pub fn named_child(&self, index: usize) -> Option<Node<'t>> {
        self.named_children().nth(index)
    }

    /// First direct child (named or anonymous) with the given kind.
    pub fn child_of_kind(&self, kind: &str) -> Option<Node<'t>> {
        self.children().find(|n| n.kind() == kind)
    }

    /// First named descendant with the given kind, in document order.
    /// The node itself is not considered.
    pub fn descendant_of_kind(&self, kind: &str) -> Option<Node<'t>> {
        self.descendants().skip(1).find(|n| n.kind() == kind)
    }

    pub fn next_named_sibling(&self) -> Option<Node<'t>> {
        let parent = self.parent()?;
        parent
            .named_children()
            .skip_while(|n| n.id != self.id)
            .nth(1)
    }

    pub fn prev_named_sibling(&self) -> Option<Node<'t>> {
        let parent = self.parent()?;
        parent
            .named_children()
            .take_while(|n| n.id != self.id)
            .last()
    }

    /// Pre-order walk over this node and its named descendants.
    pub fn descendants(&self) -> Descendants<'t> {
        Descendants {
            tree: self.tree,
            stack: vec![self.id],
        }
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}:{}-{}:{}]",
            self.kind(),
            self.start_position().row,
            self.start_position().column,
            self.end_position().row,
            self.end_position().column
        )
    }
}

/// Iterator returned by [`Node::descendants`].
pub struct Descendants<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Descendants<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let tree = self.tree;
        self.stack.extend(
            tree.data(id)
                .children
                .iter()
                .rev()
                .copied()
                .filter(|&c| tree.data(c).named),
        );
        Some(Node { tree, id })
    }
}

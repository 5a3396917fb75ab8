//! Tree construction, either node by node or from a tree-sitter parse.

use super::{NodeData, NodeId, Point, SyntaxTree};
use std::ops::Range;
use tracing::trace;

/// Builds a [`SyntaxTree`] incrementally.
///
/// Nodes are opened and closed in document order; the first node opened at
/// depth zero becomes the root. Positions are derived from byte offsets with a
/// line index over the source.
pub struct TreeBuilder {
    line_starts: Vec<usize>,
    source_len: usize,
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
    root: Option<NodeId>,
}

impl TreeBuilder {
    /// Create a builder for the given source text.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            source_len: source.len(),
            nodes: Vec::new(),
            open: Vec::new(),
            root: None,
        }
    }

    /// Convert a byte offset into a row/column point.
    pub fn point_at(&self, byte: usize) -> Point {
        let byte = byte.min(self.source_len);
        let row = self.line_starts.partition_point(|&start| start <= byte) - 1;
        Point::new(row, byte - self.line_starts[row])
    }

    /// Number of currently open nodes.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Kind of the innermost open node.
    pub fn current_kind(&self) -> Option<&'static str> {
        self.open.last().map(|&id| self.nodes[id].kind)
    }

    /// Open a node that will receive children until [`close`](Self::close).
    pub fn open(&mut self, kind: &'static str, named: bool, start_byte: usize) -> NodeId {
        let id = self.push(kind, named, start_byte..start_byte);
        self.open.push(id);
        id
    }

    /// Close the innermost open node at `end_byte`.
    pub fn close(&mut self, end_byte: usize) -> Option<NodeId> {
        let id = self.open.pop()?;
        self.set_end(id, end_byte);
        Some(id)
    }

    /// Add a node without children.
    pub fn leaf(&mut self, kind: &'static str, named: bool, range: Range<usize>) -> NodeId {
        self.push(kind, named, range)
    }

    /// Flag a node as erroneous.
    pub fn mark_error(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.error = true;
        }
    }

    /// Finish the tree. Nodes still open are closed at the end of the source
    /// and flagged as errors.
    pub fn finish(mut self) -> SyntaxTree {
        while let Some(id) = self.open.pop() {
            trace!(kind = self.nodes[id].kind, "Closing unterminated node");
            self.nodes[id].error = true;
            self.set_end(id, self.source_len);
        }

        let root = match self.root {
            Some(root) => root,
            None => self.push("document", true, 0..self.source_len),
        };

        SyntaxTree::from_parts(self.nodes, root)
    }

    /// Copy a tree-sitter parse into an owned tree.
    pub fn from_tree_sitter(tree: &tree_sitter::Tree) -> SyntaxTree {
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut parents: Vec<NodeId> = Vec::new();
        let mut cursor = tree.walk();

        loop {
            let node = cursor.node();
            let id = nodes.len();
            let parent = parents.last().copied();
            nodes.push(NodeData {
                kind: node.kind(),
                named: node.is_named(),
                error: node.is_error() || node.is_missing(),
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
                start: Point::new(node.start_position().row, node.start_position().column),
                end: Point::new(node.end_position().row, node.end_position().column),
                parent,
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(id);
            }

            if cursor.goto_first_child() {
                parents.push(id);
                continue;
            }

            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return SyntaxTree::from_parts(nodes, 0);
                }
                parents.pop();
            }
        }
    }

    fn push(&mut self, kind: &'static str, named: bool, range: Range<usize>) -> NodeId {
        let id = self.nodes.len();
        let parent = self.open.last().copied().or(self.root);
        let start = self.point_at(range.start);
        let end = self.point_at(range.end);
        self.nodes.push(NodeData {
            kind,
            named,
            error: false,
            start_byte: range.start,
            end_byte: range.end,
            start,
            end,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => {
                self.nodes[parent].children.push(id);
                if self.nodes[parent].end_byte < range.end {
                    self.set_end(parent, range.end);
                }
            }
            None => self.root = Some(id),
        }
        id
    }

    fn set_end(&mut self, id: NodeId, end_byte: usize) {
        let end = self.point_at(end_byte);
        let node = &mut self.nodes[id];
        node.end_byte = end_byte;
        node.end = end;
    }
}

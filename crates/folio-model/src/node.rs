//! Immutable document tree.
//!
//! Positions follow a flat coordinate space: a text node occupies one unit per
//! character, a leaf occupies one unit, and every other node occupies its
//! content plus an opening and a closing unit. Positions passed to a node's
//! methods are relative to the start of that node's content, so for the
//! document root they are absolute.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attrs::Attrs;
use crate::mark::Mark;

/// Structural role of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// A block whose children are blocks (the document root, tables, lists).
    Block,
    /// A block whose children are inline content (paragraphs, headings).
    Textblock,
    /// A block without content (horizontal rules, page breaks).
    BlockLeaf,
    /// An atomic inline node (images, hard breaks, fields).
    InlineLeaf,
    /// A run of characters with a mark set.
    Text,
}

impl NodeKind {
    /// Returns `true` for inline kinds.
    pub fn is_inline(self) -> bool {
        matches!(self, Self::InlineLeaf | Self::Text)
    }

    /// Returns `true` for block kinds.
    pub fn is_block(self) -> bool {
        !self.is_inline()
    }

    /// Returns `true` for kinds that never hold child nodes.
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::BlockLeaf | Self::InlineLeaf | Self::Text)
    }

    /// Whether a node of this kind may contain a child of `child` kind.
    pub fn accepts(self, child: NodeKind) -> bool {
        match self {
            Self::Block => child.is_block(),
            Self::Textblock => child.is_inline(),
            _ => false,
        }
    }
}

/// A node of the document tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    node_type: String,
    kind: NodeKind,
    attrs: Attrs,
    content: Vec<Node>,
    text: String,
    marks: Vec<Mark>,
    size: usize,
}

impl Node {
    /// Build a non-text node.
    ///
    /// Textblock content is normalized: empty text nodes are dropped and
    /// adjacent text nodes with equal mark sets are merged.
    pub fn element(
        node_type: impl Into<String>,
        kind: NodeKind,
        attrs: Attrs,
        content: Vec<Node>,
    ) -> Self {
        debug_assert!(kind != NodeKind::Text, "use Node::text for text nodes");
        let content = if kind == NodeKind::Textblock {
            normalize_inline(content)
        } else {
            content
        };
        let size = if kind.is_leaf() {
            1
        } else {
            content.iter().map(Node::size).sum::<usize>() + 2
        };
        Self {
            node_type: node_type.into(),
            kind,
            attrs,
            content,
            text: String::new(),
            marks: Vec::new(),
            size,
        }
    }

    /// Build a text node.
    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        let text = text.into();
        Self {
            node_type: "text".into(),
            kind: NodeKind::Text,
            attrs: Attrs::new(),
            content: Vec::new(),
            size: text.chars().count(),
            text,
            marks: Mark::normalize_set(marks),
        }
    }

    /// Build a document root.
    pub fn doc(content: Vec<Node>) -> Self {
        Self::element("doc", NodeKind::Block, Attrs::new(), content)
    }

    /// Build a block container.
    pub fn block(node_type: impl Into<String>, attrs: Attrs, content: Vec<Node>) -> Self {
        Self::element(node_type, NodeKind::Block, attrs, content)
    }

    /// Build a textblock.
    pub fn textblock(node_type: impl Into<String>, attrs: Attrs, content: Vec<Node>) -> Self {
        Self::element(node_type, NodeKind::Textblock, attrs, content)
    }

    /// Build a block-level atom.
    pub fn block_leaf(node_type: impl Into<String>, attrs: Attrs) -> Self {
        Self::element(node_type, NodeKind::BlockLeaf, attrs, Vec::new())
    }

    /// Build an inline atom.
    pub fn inline_leaf(node_type: impl Into<String>, attrs: Attrs) -> Self {
        Self::element(node_type, NodeKind::InlineLeaf, attrs, Vec::new())
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// The text payload, for text nodes.
    pub fn text_value(&self) -> Option<&str> {
        (self.kind == NodeKind::Text).then_some(self.text.as_str())
    }

    /// Number of position units this node occupies.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of position units occupied by this node's children.
    pub fn content_size(&self) -> usize {
        if self.kind.is_leaf() {
            0
        } else {
            self.size - 2
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_textblock(&self) -> bool {
        self.kind == NodeKind::Textblock
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    /// A copy of this node with a different attribute dictionary.
    pub fn with_attrs(&self, attrs: Attrs) -> Self {
        Self {
            attrs,
            ..self.clone()
        }
    }

    /// A copy of this node with a different mark set.
    pub fn with_marks(&self, marks: Vec<Mark>) -> Self {
        Self {
            marks: Mark::normalize_set(marks),
            ..self.clone()
        }
    }

    /// A copy of this node with different children.
    pub fn with_content(&self, content: Vec<Node>) -> Self {
        let mut node = Self::element(self.node_type.clone(), self.kind, self.attrs.clone(), content);
        node.marks = self.marks.clone();
        node
    }

    /// The characters `[from, to)` of a text node, keeping its marks.
    ///
    /// Non-text nodes are returned unchanged.
    pub fn cut_text(&self, from: usize, to: usize) -> Self {
        if !self.is_text() {
            return self.clone();
        }
        let to = to.min(self.size);
        let from = from.min(to);
        let text: String = self.text.chars().skip(from).take(to - from).collect();
        Self::text(text, self.marks.clone())
    }

    /// Concatenated text of every text node below this one.
    pub fn text_content(&self) -> String {
        if self.is_text() {
            return self.text.clone();
        }
        let mut out = String::new();
        for child in &self.content {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Text between two content positions.
    pub fn text_between(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        self.collect_text(0, from, to, &mut out);
        out
    }

    fn collect_text(&self, base: usize, from: usize, to: usize, out: &mut String) {
        let mut pos = base;
        for child in &self.content {
            let end = pos + child.size;
            if end > from && pos < to {
                if child.is_text() {
                    let start = from.saturating_sub(pos);
                    let stop = (to - pos).min(child.size);
                    out.extend(child.text.chars().skip(start).take(stop - start));
                } else if !child.is_leaf() {
                    child.collect_text(pos + 1, from, to, out);
                }
            }
            pos = end;
        }
    }

    /// The node starting at `pos`, or the text node containing it.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut offset = 0;
        for child in &self.content {
            let end = offset + child.size;
            if pos == offset {
                return Some(child);
            }
            if pos < end {
                if child.is_text() {
                    return Some(child);
                }
                if child.is_leaf() {
                    return None;
                }
                return child.node_at(pos - offset - 1);
            }
            offset = end;
        }
        None
    }

    /// Pre-order walk over all descendants with their positions.
    ///
    /// The callback returns whether to descend into the visited node.
    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        self.walk(0, f);
    }

    fn walk<F>(&self, base: usize, f: &mut F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        let mut pos = base;
        for child in &self.content {
            if f(child, pos) && !child.content.is_empty() {
                child.walk(pos + 1, f);
            }
            pos += child.size;
        }
    }

    /// Canonical JSON form: `{type, attrs?, content?, text?, marks?}`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.node_type.clone()));
        if !self.attrs.is_empty() {
            obj.insert("attrs".into(), Value::Object(self.attrs.clone()));
        }
        if self.is_text() {
            obj.insert("text".into(), Value::String(self.text.clone()));
        }
        if !self.content.is_empty() {
            obj.insert(
                "content".into(),
                Value::Array(self.content.iter().map(Node::to_json).collect()),
            );
        }
        if !self.marks.is_empty() {
            obj.insert(
                "marks".into(),
                Value::Array(self.marks.iter().map(Mark::to_json).collect()),
            );
        }
        Value::Object(obj)
    }
}

fn normalize_inline(content: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(content.len());
    for node in content {
        if node.is_text() && node.text.is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.is_text() && node.is_text() && last.marks == node.marks {
                last.text.push_str(&node.text);
                last.size += node.size;
                continue;
            }
        }
        out.push(node);
    }
    out
}

//! Node and mark construction from serialized forms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attrs::Attrs;
use crate::error::{SchemaError, SchemaResult};
use crate::mark::Mark;
use crate::node::{Node, NodeKind};

/// The node-construction capability the replay engine consumes.
///
/// Implementors only have to describe their vocabulary; building nodes from
/// the canonical JSON form is provided.
pub trait Schema {
    /// The structural kind of a node type, or `None` if the type is unknown.
    fn node_kind(&self, node_type: &str) -> Option<NodeKind>;

    /// Whether the schema knows a mark type.
    fn has_mark(&self, mark_type: &str) -> bool;

    /// Build a mark, validating its type.
    fn mark(&self, mark_type: &str, attrs: Attrs) -> SchemaResult<Mark> {
        if !self.has_mark(mark_type) {
            return Err(SchemaError::UnknownMarkType(mark_type.to_string()));
        }
        Ok(Mark::with_attrs(mark_type, attrs))
    }

    /// Build a non-empty text node.
    fn text(&self, text: &str, marks: Vec<Mark>) -> SchemaResult<Node> {
        if text.is_empty() {
            return Err(SchemaError::Malformed("empty text node".into()));
        }
        Ok(Node::text(text, marks))
    }

    /// Build a mark from its `{type, attrs?}` form.
    fn mark_from_json(&self, value: &Value) -> SchemaResult<Mark> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::Malformed("mark must be an object".into()))?;
        let mark_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::Malformed("mark is missing its type".into()))?;
        self.mark(mark_type, read_attrs(obj.get("attrs"))?)
    }

    /// Build a node (and its subtree) from its canonical JSON form.
    fn node_from_json(&self, value: &Value) -> SchemaResult<Node> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::Malformed("node must be an object".into()))?;
        let node_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::Malformed("node is missing its type".into()))?;
        let kind = self
            .node_kind(node_type)
            .ok_or_else(|| SchemaError::UnknownNodeType(node_type.to_string()))?;

        let marks = match obj.get("marks") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|m| self.mark_from_json(m))
                .collect::<SchemaResult<Vec<_>>>()?,
            Some(_) => return Err(SchemaError::Malformed("marks must be an array".into())),
        };

        if kind == NodeKind::Text {
            let text = obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::Malformed("text node is missing its text".into()))?;
            return self.text(text, marks);
        }

        let content = match obj.get("content") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|c| self.node_from_json(c))
                .collect::<SchemaResult<Vec<_>>>()?,
            Some(_) => return Err(SchemaError::Malformed("content must be an array".into())),
        };
        if let Some(child) = content.iter().find(|c| !kind.accepts(c.kind())) {
            return Err(SchemaError::InvalidContent {
                parent: node_type.to_string(),
                child: child.node_type().to_string(),
            });
        }

        let node = Node::element(node_type, kind, read_attrs(obj.get("attrs"))?, content);
        Ok(if marks.is_empty() {
            node
        } else {
            node.with_marks(marks)
        })
    }
}

fn read_attrs(value: Option<&Value>) -> SchemaResult<Attrs> {
    match value {
        None | Some(Value::Null) => Ok(Attrs::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(SchemaError::Malformed("attrs must be an object".into())),
    }
}

/// A table-driven schema.
///
/// The default vocabulary covers common rich-text documents; hosts extend it
/// with [`BasicSchema::with_node`] and [`BasicSchema::with_mark`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicSchema {
    nodes: BTreeMap<String, NodeKind>,
    marks: BTreeSet<String>,
}

impl BasicSchema {
    /// A schema that only knows the document root and text.
    pub fn empty() -> Self {
        Self {
            nodes: BTreeMap::new(),
            marks: BTreeSet::new(),
        }
        .with_node("doc", NodeKind::Block)
        .with_node("text", NodeKind::Text)
    }

    /// Register a node type.
    pub fn with_node(mut self, node_type: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes.insert(node_type.into(), kind);
        self
    }

    /// Register a mark type.
    pub fn with_mark(mut self, mark_type: impl Into<String>) -> Self {
        self.marks.insert(mark_type.into());
        self
    }
}

impl Default for BasicSchema {
    fn default() -> Self {
        let mut schema = Self::empty();
        for name in [
            "blockquote",
            "bulletList",
            "orderedList",
            "listItem",
            "table",
            "tableRow",
            "tableCell",
        ] {
            schema = schema.with_node(name, NodeKind::Block);
        }
        for name in ["paragraph", "heading"] {
            schema = schema.with_node(name, NodeKind::Textblock);
        }
        for name in ["horizontalRule", "pageBreak"] {
            schema = schema.with_node(name, NodeKind::BlockLeaf);
        }
        for name in ["image", "hardBreak", "tab"] {
            schema = schema.with_node(name, NodeKind::InlineLeaf);
        }
        for name in ["bold", "italic", "underline", "strike", "link", "textStyle"] {
            schema = schema.with_mark(name);
        }
        schema
    }
}

impl Schema for BasicSchema {
    fn node_kind(&self, node_type: &str) -> Option<NodeKind> {
        self.nodes.get(node_type).copied()
    }

    fn has_mark(&self, mark_type: &str) -> bool {
        self.marks.contains(mark_type)
    }
}

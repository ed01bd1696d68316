//! Error types for the document model.

use thiserror::Error;

/// Errors raised while building nodes or marks from serialized forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The serialized form names a node type the schema does not know.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    /// The serialized form names a mark type the schema does not know.
    #[error("unknown mark type: {0}")]
    UnknownMarkType(String),

    /// A child node is not allowed inside its parent.
    #[error("{child} content is not allowed inside {parent}")]
    InvalidContent { parent: String, child: String },

    /// The serialized form is structurally invalid.
    #[error("malformed serialized form: {0}")]
    Malformed(String),
}

/// Errors raised when a transaction step cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// A position lies outside the parent content.
    #[error("position {pos} out of range (content size {size})")]
    OutOfRange { pos: usize, size: usize },

    /// The range start lies after its end.
    #[error("invalid range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    /// The range starts or ends inside a node it does not fully cover.
    #[error("range {from}..{to} cuts through a {node_type} node")]
    CrossesNode {
        from: usize,
        to: usize,
        node_type: String,
    },

    /// The inserted content is not allowed in the target parent.
    #[error("{child} content is not allowed inside {parent}")]
    InvalidContent { parent: String, child: String },

    /// No node starts at the given position.
    #[error("no node at position {0}")]
    NoNodeAt(usize),

    /// Attributes were set on a text node.
    #[error("cannot set attributes on the text node at position {0}")]
    TextNode(usize),
}

/// Convenience alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Convenience alias for step results.
pub type StepResult<T> = Result<T, StepError>;

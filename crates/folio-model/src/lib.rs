//! Document model for Folio.
//!
//! Provides the immutable rich-text tree that the diff and replay engines
//! operate on, together with the host-side capabilities they consume.
//!
//! # Key Types
//!
//! - [`Node`] / [`NodeKind`] -- Immutable document tree with position arithmetic
//! - [`Mark`] -- Named, attributed inline decoration (bold, link, ...)
//! - [`Attrs`] -- JSON attribute dictionary carried by nodes and marks
//! - [`Schema`] / [`BasicSchema`] -- Node and mark construction from serialized forms
//! - [`Transaction`] / [`Step`] -- Edit operations applied to a document

pub mod attrs;
pub mod error;
pub mod mark;
pub mod node;
pub mod schema;
pub mod transform;

pub use attrs::{attrs_from, Attrs};
pub use error::{SchemaError, SchemaResult, StepError, StepResult};
pub use mark::Mark;
pub use node::{Node, NodeKind};
pub use schema::{BasicSchema, Schema};
pub use transform::{Step, Transaction};

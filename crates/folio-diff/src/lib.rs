//! Diff engine for Folio.
//!
//! Computes structural differences between two versions of a rich-text
//! document. Block-level nodes are aligned first; text-bearing blocks are then
//! compared token by token so that every change carries exact positions in the
//! old document.
//!
//! # Key Types
//!
//! - [`myers_diff`] / [`EditOp`] -- Shortest edit script between two sequences
//! - [`diff_sequences`] / [`SequenceBuilder`] -- Edit scripts turned into added/deleted/modified records
//! - [`diff_attributes`] / [`AttributesDiff`] -- Dotted-path attribute deltas
//! - [`diff_inline`] / [`InlineDiff`] -- Character and inline-node level changes
//! - [`diff_documents`] / [`DocumentDiff`] / [`NodeDiff`] -- Hierarchical document diff
//! - [`DiffConfig`] -- Heuristic thresholds and housekeeping keys

pub mod attributes;
pub mod config;
pub mod document;
pub mod error;
pub mod inline;
pub mod myers;
pub mod position;
pub mod sequence;
pub mod similarity;

pub use attributes::{apply_attributes_diff, diff_attributes, AttributesDiff, ValueChange};
pub use config::DiffConfig;
pub use document::{
    diff_documents, flatten_document, CommentDiff, DocumentDiff, NodeDiff, NodeInfo, TextblockDiff,
};
pub use error::{DiffError, DiffResult};
pub use inline::{diff_inline, flatten_inline, run_attrs, FlatInline, InlineDiff, InlineKind, InlineToken};
pub use myers::{myers_diff, EditOp};
pub use position::PositionIndex;
pub use sequence::{
    absorb_short_equalities, diff_sequences, slide_changes, DiffAction, IndexedStep, SequenceBuilder,
};
pub use similarity::{is_similar, levenshtein, similarity_ratio};

//! Document-level diff: compare the block structure of two documents.
//!
//! Both documents are flattened into pre-order lists of block nodes. The
//! lists are aligned with the sequence layer; text blocks are compared by
//! identity or text, and changed text blocks carry an inline diff.
//!
//! A kept pair only counts as matched when the parents of both nodes are
//! matched with each other. Anything else is reported as a deletion plus an
//! insertion, so every insertion can be anchored next to matched content.

use folio_model::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::attributes::{diff_attributes, AttributesDiff};
use crate::config::DiffConfig;
use crate::inline::{diff_inline, flatten_inline, FlatInline, InlineDiff};
use crate::sequence::{diff_sequences, DiffAction, IndexedStep, SequenceBuilder};
use crate::similarity::is_similar;

/// A block node of a flattened document.
#[derive(Clone, Debug)]
pub struct NodeInfo<'a> {
    pub node: &'a Node,
    /// Position of the node's opening in its document.
    pub pos: usize,
    /// Nesting depth; top-level blocks are at depth 0.
    pub depth: usize,
    /// Index of this entry in the flattened list.
    pub index: usize,
    /// Index of the enclosing block entry; `None` for top-level blocks.
    pub parent: Option<usize>,
    /// Number of entries that follow this one and lie inside it.
    pub descendants: usize,
    /// Flattened content, for text blocks.
    pub inline: Option<FlatInline>,
}

impl NodeInfo<'_> {
    /// Plain text of a text block; empty for other blocks.
    pub fn text(&self) -> &str {
        self.inline.as_ref().map_or("", |flat| flat.text.as_str())
    }
}

/// Flatten a document into its block nodes in pre-order.
///
/// Text blocks are not descended into; their content is flattened into
/// [`NodeInfo::inline`] instead.
pub fn flatten_document(doc: &Node) -> Vec<NodeInfo<'_>> {
    let mut out = Vec::new();
    collect_blocks(doc, 0, None, 0, &mut out);
    out
}

fn collect_blocks<'a>(
    node: &'a Node,
    base: usize,
    parent: Option<usize>,
    depth: usize,
    out: &mut Vec<NodeInfo<'a>>,
) {
    let mut pos = base;
    for child in node.content() {
        if child.kind().is_block() {
            let index = out.len();
            out.push(NodeInfo {
                node: child,
                pos,
                depth,
                index,
                parent,
                descendants: 0,
                inline: child.is_textblock().then(|| flatten_inline(child, pos)),
            });
            if !child.is_leaf() && !child.is_textblock() {
                collect_blocks(child, pos + 1, Some(index), depth + 1, out);
            }
            out[index].descendants = out.len() - index - 1;
        }
        pos += child.size();
    }
}

/// Content changes of a modified text block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextblockDiff {
    pub old_text: String,
    pub new_text: String,
    pub inline_diffs: Vec<InlineDiff>,
}

/// A change to one block node. Positions refer to the old document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NodeDiff {
    /// A node inserted at `pos`.
    Added {
        node_type: String,
        pos: usize,
        node: Value,
        text: Option<String>,
    },
    /// The node at `pos` was removed.
    Deleted {
        node_type: String,
        pos: usize,
        node: Value,
        text: Option<String>,
    },
    /// The node at `pos` changed in place.
    Modified {
        node_type: String,
        pos: usize,
        attrs_diff: Option<AttributesDiff>,
        content: Option<TextblockDiff>,
    },
}

impl NodeDiff {
    pub fn action(&self) -> DiffAction {
        match self {
            Self::Added { .. } => DiffAction::Added,
            Self::Deleted { .. } => DiffAction::Deleted,
            Self::Modified { .. } => DiffAction::Modified,
        }
    }

    pub fn pos(&self) -> usize {
        match self {
            Self::Added { pos, .. } | Self::Deleted { pos, .. } | Self::Modified { pos, .. } => *pos,
        }
    }

    pub fn node_type(&self) -> &str {
        match self {
            Self::Added { node_type, .. }
            | Self::Deleted { node_type, .. }
            | Self::Modified { node_type, .. } => node_type,
        }
    }
}

/// A change to a document comment. Reserved; never produced yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDiff {
    pub action: DiffAction,
    pub comment_id: String,
}

/// The result of comparing two documents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDiff {
    /// Block-level changes in old-document order.
    pub doc_diffs: Vec<NodeDiff>,
    pub comment_diffs: Vec<CommentDiff>,
}

impl DocumentDiff {
    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.doc_diffs.is_empty() && self.comment_diffs.is_empty()
    }

    /// Number of block-level changes.
    pub fn len(&self) -> usize {
        self.doc_diffs.len()
    }

    /// Number of added nodes.
    pub fn additions(&self) -> usize {
        self.count(DiffAction::Added)
    }

    /// Number of deleted nodes.
    pub fn deletions(&self) -> usize {
        self.count(DiffAction::Deleted)
    }

    /// Number of modified nodes.
    pub fn modifications(&self) -> usize {
        self.count(DiffAction::Modified)
    }

    fn count(&self, action: DiffAction) -> usize {
        self.doc_diffs.iter().filter(|d| d.action() == action).count()
    }
}

/// Compare two documents.
pub fn diff_documents(old: &Node, new: &Node, config: &DiffConfig) -> DocumentDiff {
    let old_nodes = flatten_document(old);
    let new_nodes = flatten_document(new);
    let mut builder = BlockBuilder {
        old: &old_nodes,
        new: &new_nodes,
        config,
        handled_old: vec![false; old_nodes.len()],
        handled_new: vec![false; new_nodes.len()],
        counterpart: vec![None; new_nodes.len()],
    };
    let mut doc_diffs = diff_sequences(&old_nodes, &new_nodes, &mut builder);
    // Stable, so insertions sharing an anchor keep their new-document order.
    doc_diffs.sort_by_key(NodeDiff::pos);
    debug!(
        old_nodes = old_nodes.len(),
        new_nodes = new_nodes.len(),
        records = doc_diffs.len(),
        "compared documents"
    );
    DocumentDiff {
        doc_diffs,
        comment_diffs: Vec::new(),
    }
}

/// Block comparison rules plus the dedupe state of one comparison.
///
/// Descendants of an added or deleted container are marked handled so the
/// container is reported once. `counterpart` maps each matched new entry to
/// its old entry.
struct BlockBuilder<'a, 'd> {
    old: &'a [NodeInfo<'d>],
    new: &'a [NodeInfo<'d>],
    config: &'a DiffConfig,
    handled_old: Vec<bool>,
    handled_new: Vec<bool>,
    counterpart: Vec<Option<usize>>,
}

impl BlockBuilder<'_, '_> {
    fn same_identity(&self, old: &NodeInfo<'_>, new: &NodeInfo<'_>) -> bool {
        let key = &self.config.paragraph_id_attribute;
        match (identifier(old.node, key), identifier(new.node, key)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn similar_enough(&self, old: &str, new: &str) -> bool {
        is_similar(
            old,
            new,
            self.config.min_similarity_length,
            self.config.similarity_threshold,
        )
    }

    fn parents_matched(&self, old: &NodeInfo<'_>, new: &NodeInfo<'_>) -> bool {
        match (old.parent, new.parent) {
            (None, None) => true,
            (Some(old_parent), Some(new_parent)) => self.counterpart[new_parent] == Some(old_parent),
            _ => false,
        }
    }

    /// Where the new entry goes in the old document: after the old
    /// counterpart of its nearest matched preceding sibling, else at the start
    /// of its parent's counterpart.
    ///
    /// Parents without a counterpart are reported whole, so their children
    /// never get here.
    fn insertion_pos(&self, new: &NodeInfo<'_>) -> usize {
        let first_sibling = new.parent.map_or(0, |parent| parent + 1);
        let after_sibling = self.new[first_sibling..new.index]
            .iter()
            .rev()
            .filter(|sibling| sibling.depth == new.depth)
            .find_map(|sibling| self.counterpart[sibling.index]);
        if let Some(old) = after_sibling {
            let old = &self.old[old];
            return old.pos + old.node.size();
        }
        new.parent
            .and_then(|parent| self.counterpart[parent])
            .map_or(0, |old| self.old[old].pos + 1)
    }

    fn added_record(&mut self, new: &NodeInfo<'_>) -> NodeDiff {
        mark_subtree(&mut self.handled_new, new);
        NodeDiff::Added {
            node_type: new.node.node_type().to_string(),
            pos: self.insertion_pos(new),
            node: new.node.to_json(),
            text: new.inline.as_ref().map(|flat| flat.text.clone()),
        }
    }

    fn deleted_record(&mut self, old: &NodeInfo<'_>) -> NodeDiff {
        mark_subtree(&mut self.handled_old, old);
        NodeDiff::Deleted {
            node_type: old.node.node_type().to_string(),
            pos: old.pos,
            node: old.node.to_json(),
            text: old.inline.as_ref().map(|flat| flat.text.clone()),
        }
    }

    fn modified_record(&self, old: &NodeInfo<'_>, new: &NodeInfo<'_>) -> Option<NodeDiff> {
        let attrs_diff = diff_attributes(
            old.node.attrs(),
            new.node.attrs(),
            &self.config.ignored_attributes,
        );
        let content = match (&old.inline, &new.inline) {
            (Some(a), Some(b)) => {
                let inline_diffs = diff_inline(a, b, self.config);
                (!inline_diffs.is_empty()).then(|| TextblockDiff {
                    old_text: a.text.clone(),
                    new_text: b.text.clone(),
                    inline_diffs,
                })
            }
            _ => None,
        };
        if attrs_diff.is_none() && content.is_none() {
            return None;
        }
        Some(NodeDiff::Modified {
            node_type: old.node.node_type().to_string(),
            pos: old.pos,
            attrs_diff,
            content,
        })
    }

    /// Settle a pair the edit script lined up.
    ///
    /// Content moved out of a deleted container, into an added one, or
    /// between containers that are not matched with each other is reported
    /// as a deletion and an insertion.
    fn settle_pair(
        &mut self,
        old: &NodeInfo<'_>,
        new: &NodeInfo<'_>,
        changed: bool,
        out: &mut Vec<NodeDiff>,
    ) {
        let gone = self.handled_old[old.index];
        let placed = self.handled_new[new.index];
        if !gone && !placed && self.parents_matched(old, new) {
            self.counterpart[new.index] = Some(old.index);
            if changed {
                out.extend(self.modified_record(old, new));
            }
            return;
        }
        if !gone {
            out.push(self.deleted_record(old));
        }
        if !placed {
            out.push(self.added_record(new));
        }
    }
}

impl<'d> SequenceBuilder<NodeInfo<'d>> for BlockBuilder<'_, 'd> {
    type Record = NodeDiff;

    fn equals(&self, old: &NodeInfo<'d>, new: &NodeInfo<'d>) -> bool {
        if old.node.node_type() != new.node.node_type() {
            return false;
        }
        if old.node.is_textblock() && new.node.is_textblock() {
            return self.same_identity(old, new) || old.text() == new.text();
        }
        let key = &self.config.row_id_attribute;
        match (identifier(old.node, key), identifier(new.node, key)) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    fn modified_when_equal(&self, old: &NodeInfo<'d>, new: &NodeInfo<'d>) -> bool {
        let ignored = &self.config.ignored_attributes;
        if diff_attributes(old.node.attrs(), new.node.attrs(), ignored).is_some() {
            return true;
        }
        match (&old.inline, &new.inline) {
            (Some(a), Some(b)) => !a.same_content(b, ignored),
            _ => false,
        }
    }

    fn can_treat_as_modification(&self, old: &NodeInfo<'d>, new: &NodeInfo<'d>) -> bool {
        old.node.is_textblock()
            && new.node.is_textblock()
            && old.node.node_type() == new.node.node_type()
            && (self.same_identity(old, new) || self.similar_enough(old.text(), new.text()))
    }

    fn unchanged(
        &mut self,
        _step: IndexedStep,
        old: &NodeInfo<'d>,
        new: &NodeInfo<'d>,
        out: &mut Vec<NodeDiff>,
    ) {
        let changed = self.modified_when_equal(old, new);
        self.settle_pair(old, new, changed, out);
    }

    fn added(&mut self, _step: IndexedStep, new: &NodeInfo<'d>, out: &mut Vec<NodeDiff>) {
        if !self.handled_new[new.index] {
            out.push(self.added_record(new));
        }
    }

    fn deleted(&mut self, _step: IndexedStep, old: &NodeInfo<'d>, out: &mut Vec<NodeDiff>) {
        if !self.handled_old[old.index] {
            out.push(self.deleted_record(old));
        }
    }

    fn modified(
        &mut self,
        _old_index: usize,
        _new_index: usize,
        old: &NodeInfo<'d>,
        new: &NodeInfo<'d>,
        out: &mut Vec<NodeDiff>,
    ) {
        self.settle_pair(old, new, true, out);
    }
}

fn identifier<'n>(node: &'n Node, key: &str) -> Option<&'n Value> {
    node.attrs().get(key).filter(|value| !value.is_null())
}

fn mark_subtree(handled: &mut [bool], info: &NodeInfo<'_>) {
    for flag in &mut handled[info.index..=info.index + info.descendants] {
        *flag = true;
    }
}

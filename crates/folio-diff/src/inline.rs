//! Inline diff: compare the content of two textblocks.
//!
//! A textblock is flattened into one token per character plus one token per
//! inline atom. Per-token changes are grouped into ranges so that typing a
//! word yields one record rather than one per character.

use std::collections::BTreeSet;

use folio_model::{Attrs, Mark, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::attributes::{diff_attributes, AttributesDiff};
use crate::config::DiffConfig;
use crate::error::{DiffError, DiffResult};
use crate::myers::EditOp;
use crate::position::PositionIndex;
use crate::sequence::{
    absorb_short_equalities, diff_sequences, DiffAction, IndexedStep, SequenceBuilder,
};

/// One comparable unit of inline content.
#[derive(Clone, Debug, PartialEq)]
pub enum InlineToken {
    /// A single character with the run attributes of its text node.
    Text { ch: char, run_attrs: Attrs },
    /// An inline atom together with its canonical JSON form.
    Node { node: Node, json: Value },
}

impl InlineToken {
    pub fn kind(&self) -> InlineKind {
        match self {
            Self::Text { .. } => InlineKind::Text,
            Self::Node { .. } => InlineKind::InlineNode,
        }
    }

    /// Whether two tokens show the same content once `ignored` attribute keys
    /// are left out.
    pub fn same_as(&self, other: &Self, ignored: &BTreeSet<String>) -> bool {
        match (self, other) {
            (Self::Text { ch: a, run_attrs: x }, Self::Text { ch: b, run_attrs: y }) => {
                a == b && diff_attributes(x, y, ignored).is_none()
            }
            (Self::Node { node: a, .. }, Self::Node { node: b, .. }) => {
                a.node_type() == b.node_type()
                    && a.marks() == b.marks()
                    && diff_attributes(a.attrs(), b.attrs(), ignored).is_none()
            }
            _ => false,
        }
    }
}

/// Which kind of inline content a record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InlineKind {
    Text,
    InlineNode,
}

/// A flattened textblock.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatInline {
    pub tokens: Vec<InlineToken>,
    /// Token index to position in the document the block was taken from.
    pub positions: PositionIndex,
    /// Concatenated plain text.
    pub text: String,
}

impl FlatInline {
    /// Token-wise [`InlineToken::same_as`].
    pub fn same_content(&self, other: &Self, ignored: &BTreeSet<String>) -> bool {
        self.tokens.len() == other.tokens.len()
            && self
                .tokens
                .iter()
                .zip(&other.tokens)
                .all(|(a, b)| a.same_as(b, ignored))
    }
}

/// Run attributes derived from a mark set.
///
/// Each mark contributes its attribute object, or `true` if it has none.
pub fn run_attrs(marks: &[Mark]) -> Attrs {
    marks
        .iter()
        .map(|mark| {
            let value = if mark.attrs().is_empty() {
                Value::Bool(true)
            } else {
                Value::Object(mark.attrs().clone())
            };
            (mark.mark_type().to_string(), value)
        })
        .collect()
}

/// Flatten the textblock that starts at document position `pos`.
pub fn flatten_inline(block: &Node, pos: usize) -> FlatInline {
    let start = pos + 1;
    let mut positions = PositionIndex::new(start + block.content_size());
    let mut tokens = Vec::new();
    let mut at = start;
    for child in block.content() {
        match child.text_value() {
            Some(text) => {
                let attrs = run_attrs(child.marks());
                tokens.extend(text.chars().map(|ch| InlineToken::Text {
                    ch,
                    run_attrs: attrs.clone(),
                }));
            }
            None => tokens.push(InlineToken::Node {
                node: child.clone(),
                json: child.to_json(),
            }),
        }
        positions.push(child.size(), at);
        at += child.size();
    }
    FlatInline {
        tokens,
        positions,
        text: block.text_content(),
    }
}

/// A change inside a textblock. Positions refer to the old document.
///
/// Serialized as a flat object carrying `action`, `kind` and a `start`/`end`
/// span; insertions have `start == end`, or both `null` when unanchored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "InlineRecord", try_from = "InlineRecord")]
pub enum InlineDiff {
    /// Text inserted before `pos`.
    TextAdded {
        pos: Option<usize>,
        text: String,
        run_attrs: Attrs,
    },
    TextDeleted {
        start: usize,
        end: usize,
        text: String,
        run_attrs: Attrs,
    },
    /// Same characters, different run attributes.
    TextModified {
        start: usize,
        end: usize,
        text: String,
        run_attrs_diff: AttributesDiff,
    },
    NodeAdded {
        pos: Option<usize>,
        node_type: String,
        node: Value,
    },
    NodeDeleted {
        start: usize,
        end: usize,
        node_type: String,
        node: Value,
    },
    NodeModified {
        start: usize,
        end: usize,
        node_type: String,
        old_node: Value,
        new_node: Value,
        attrs_diff: Option<AttributesDiff>,
    },
}

impl InlineDiff {
    pub fn action(&self) -> DiffAction {
        match self {
            Self::TextAdded { .. } | Self::NodeAdded { .. } => DiffAction::Added,
            Self::TextDeleted { .. } | Self::NodeDeleted { .. } => DiffAction::Deleted,
            Self::TextModified { .. } | Self::NodeModified { .. } => DiffAction::Modified,
        }
    }

    pub fn kind(&self) -> InlineKind {
        match self {
            Self::TextAdded { .. } | Self::TextDeleted { .. } | Self::TextModified { .. } => {
                InlineKind::Text
            }
            _ => InlineKind::InlineNode,
        }
    }

    /// Where the change starts in the old document, if anchored.
    pub fn anchor(&self) -> Option<usize> {
        match self {
            Self::TextAdded { pos, .. } | Self::NodeAdded { pos, .. } => *pos,
            Self::TextDeleted { start, .. }
            | Self::TextModified { start, .. }
            | Self::NodeDeleted { start, .. }
            | Self::NodeModified { start, .. } => Some(*start),
        }
    }
}

/// Wire form of [`InlineDiff`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineRecord {
    action: DiffAction,
    kind: InlineKind,
    start: Option<usize>,
    end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_attrs: Option<Attrs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_attrs_diff: Option<AttributesDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_node: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_node: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attrs_diff: Option<AttributesDiff>,
}

impl InlineRecord {
    fn new(action: DiffAction, kind: InlineKind, start: Option<usize>, end: Option<usize>) -> Self {
        Self {
            action,
            kind,
            start,
            end,
            text: None,
            run_attrs: None,
            run_attrs_diff: None,
            node_type: None,
            node: None,
            old_node: None,
            new_node: None,
            attrs_diff: None,
        }
    }
}

impl From<InlineDiff> for InlineRecord {
    fn from(diff: InlineDiff) -> Self {
        let (action, kind) = (diff.action(), diff.kind());
        match diff {
            InlineDiff::TextAdded {
                pos,
                text,
                run_attrs,
            } => Self {
                text: Some(text),
                run_attrs: Some(run_attrs),
                ..Self::new(action, kind, pos, pos)
            },
            InlineDiff::TextDeleted {
                start,
                end,
                text,
                run_attrs,
            } => Self {
                text: Some(text),
                run_attrs: Some(run_attrs),
                ..Self::new(action, kind, Some(start), Some(end))
            },
            InlineDiff::TextModified {
                start,
                end,
                text,
                run_attrs_diff,
            } => Self {
                text: Some(text),
                run_attrs_diff: Some(run_attrs_diff),
                ..Self::new(action, kind, Some(start), Some(end))
            },
            InlineDiff::NodeAdded {
                pos,
                node_type,
                node,
            } => Self {
                node_type: Some(node_type),
                node: Some(node),
                ..Self::new(action, kind, pos, pos)
            },
            InlineDiff::NodeDeleted {
                start,
                end,
                node_type,
                node,
            } => Self {
                node_type: Some(node_type),
                node: Some(node),
                ..Self::new(action, kind, Some(start), Some(end))
            },
            InlineDiff::NodeModified {
                start,
                end,
                node_type,
                old_node,
                new_node,
                attrs_diff,
            } => Self {
                node_type: Some(node_type),
                old_node: Some(old_node),
                new_node: Some(new_node),
                attrs_diff,
                ..Self::new(action, kind, Some(start), Some(end))
            },
        }
    }
}

impl TryFrom<InlineRecord> for InlineDiff {
    type Error = DiffError;

    fn try_from(record: InlineRecord) -> DiffResult<Self> {
        Ok(match (record.action, record.kind) {
            (DiffAction::Added, InlineKind::Text) => Self::TextAdded {
                pos: record.start,
                text: required(record.text, "text")?,
                run_attrs: record.run_attrs.unwrap_or_default(),
            },
            (DiffAction::Deleted, InlineKind::Text) => Self::TextDeleted {
                start: required(record.start, "start")?,
                end: required(record.end, "end")?,
                text: required(record.text, "text")?,
                run_attrs: record.run_attrs.unwrap_or_default(),
            },
            (DiffAction::Modified, InlineKind::Text) => Self::TextModified {
                start: required(record.start, "start")?,
                end: required(record.end, "end")?,
                text: required(record.text, "text")?,
                run_attrs_diff: record.run_attrs_diff.unwrap_or_default(),
            },
            (DiffAction::Added, InlineKind::InlineNode) => Self::NodeAdded {
                pos: record.start,
                node_type: required(record.node_type, "nodeType")?,
                node: required(record.node, "node")?,
            },
            (DiffAction::Deleted, InlineKind::InlineNode) => Self::NodeDeleted {
                start: required(record.start, "start")?,
                end: required(record.end, "end")?,
                node_type: required(record.node_type, "nodeType")?,
                node: required(record.node, "node")?,
            },
            (DiffAction::Modified, InlineKind::InlineNode) => Self::NodeModified {
                start: required(record.start, "start")?,
                end: required(record.end, "end")?,
                node_type: required(record.node_type, "nodeType")?,
                old_node: required(record.old_node, "oldNode")?,
                new_node: required(record.new_node, "newNode")?,
                attrs_diff: record.attrs_diff,
            },
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> DiffResult<T> {
    value.ok_or_else(|| DiffError::InvalidRecord(format!("inline record is missing `{field}`")))
}

/// Compare two flattened textblocks.
pub fn diff_inline(old: &FlatInline, new: &FlatInline, config: &DiffConfig) -> Vec<InlineDiff> {
    let mut builder = InlineBuilder { old, config };
    let events = diff_sequences(&old.tokens, &new.tokens, &mut builder);
    let diffs = group(old, config, events);
    if !diffs.is_empty() {
        debug!(
            old_tokens = old.tokens.len(),
            new_tokens = new.tokens.len(),
            records = diffs.len(),
            "inline content differs"
        );
    }
    diffs
}

/// A per-character change before grouping.
#[derive(Clone, Debug)]
struct TextEvent {
    action: DiffAction,
    old_index: usize,
    new_index: usize,
    ch: char,
    old_attrs: Attrs,
    new_attrs: Attrs,
}

enum Event {
    Text(TextEvent),
    Node(InlineDiff),
}

struct InlineBuilder<'a> {
    old: &'a FlatInline,
    config: &'a DiffConfig,
}

impl InlineBuilder<'_> {
    fn text_event(
        action: DiffAction,
        step: (usize, usize),
        ch: char,
        old_attrs: &Attrs,
        new_attrs: &Attrs,
    ) -> Event {
        Event::Text(TextEvent {
            action,
            old_index: step.0,
            new_index: step.1,
            ch,
            old_attrs: old_attrs.clone(),
            new_attrs: new_attrs.clone(),
        })
    }

    /// Old-document span of the token at `index`.
    fn old_span(&self, index: usize) -> Option<(usize, usize)> {
        let positions = &self.old.positions;
        Some((positions.resolve(index)?, positions.resolve(index + 1)?))
    }
}

impl SequenceBuilder<InlineToken> for InlineBuilder<'_> {
    type Record = Event;

    fn equals(&self, old: &InlineToken, new: &InlineToken) -> bool {
        match (old, new) {
            (InlineToken::Text { ch: a, .. }, InlineToken::Text { ch: b, .. }) => a == b,
            (InlineToken::Node { node: a, .. }, InlineToken::Node { node: b, .. }) => {
                a.node_type() == b.node_type()
            }
            _ => false,
        }
    }

    fn modified_when_equal(&self, old: &InlineToken, new: &InlineToken) -> bool {
        !old.same_as(new, &self.config.ignored_attributes)
    }

    fn can_treat_as_modification(&self, old: &InlineToken, new: &InlineToken) -> bool {
        matches!(
            (old, new),
            (InlineToken::Node { node: a, .. }, InlineToken::Node { node: b, .. })
                if a.node_type() == b.node_type()
        )
    }

    fn interchangeable(&self, a: &InlineToken, b: &InlineToken) -> bool {
        a == b
    }

    // Replacements stay whole so grouping sees one deleted and one added run.
    fn reorder(&self, ops: Vec<EditOp>) -> Vec<EditOp> {
        absorb_short_equalities(&ops)
    }

    fn added(&mut self, step: IndexedStep, new: &InlineToken, out: &mut Vec<Event>) {
        let empty = Attrs::new();
        out.push(match new {
            InlineToken::Text { ch, run_attrs } => Self::text_event(
                DiffAction::Added,
                (step.old_index, step.new_index),
                *ch,
                &empty,
                run_attrs,
            ),
            InlineToken::Node { node, json } => Event::Node(InlineDiff::NodeAdded {
                pos: self.old.positions.resolve(step.old_index),
                node_type: node.node_type().to_string(),
                node: json.clone(),
            }),
        });
    }

    fn deleted(&mut self, step: IndexedStep, old: &InlineToken, out: &mut Vec<Event>) {
        let empty = Attrs::new();
        match old {
            InlineToken::Text { ch, run_attrs } => out.push(Self::text_event(
                DiffAction::Deleted,
                (step.old_index, step.new_index),
                *ch,
                run_attrs,
                &empty,
            )),
            InlineToken::Node { node, json } => {
                let span = self.old_span(step.old_index);
                out.extend(span.map(|(start, end)| {
                    Event::Node(InlineDiff::NodeDeleted {
                        start,
                        end,
                        node_type: node.node_type().to_string(),
                        node: json.clone(),
                    })
                }));
            }
        }
    }

    fn modified(
        &mut self,
        old_index: usize,
        new_index: usize,
        old: &InlineToken,
        new: &InlineToken,
        out: &mut Vec<Event>,
    ) {
        match (old, new) {
            (
                InlineToken::Text { ch, run_attrs: a },
                InlineToken::Text { run_attrs: b, .. },
            ) => out.push(Self::text_event(
                DiffAction::Modified,
                (old_index, new_index),
                *ch,
                a,
                b,
            )),
            (
                InlineToken::Node { node: a, json: from },
                InlineToken::Node { node: b, json: to },
            ) => {
                let span = self.old_span(old_index);
                out.extend(span.map(|(start, end)| {
                    Event::Node(InlineDiff::NodeModified {
                        start,
                        end,
                        node_type: a.node_type().to_string(),
                        old_node: from.clone(),
                        new_node: to.clone(),
                        attrs_diff: diff_attributes(
                            a.attrs(),
                            b.attrs(),
                            &self.config.ignored_attributes,
                        ),
                    })
                }));
            }
            _ => {}
        }
    }
}

/// A contiguous range of text events being accumulated.
struct TextRun {
    first: TextEvent,
    last_old: usize,
    last_new: usize,
    text: String,
}

impl TextRun {
    fn start(event: TextEvent) -> Self {
        Self {
            last_old: event.old_index,
            last_new: event.new_index,
            text: event.ch.to_string(),
            first: event,
        }
    }

    fn accepts(&self, event: &TextEvent) -> bool {
        if event.action != self.first.action
            || event.old_attrs != self.first.old_attrs
            || event.new_attrs != self.first.new_attrs
        {
            return false;
        }
        match event.action {
            DiffAction::Added => {
                event.old_index == self.first.old_index && event.new_index == self.last_new + 1
            }
            DiffAction::Deleted => event.old_index == self.last_old + 1,
            DiffAction::Modified => {
                event.old_index == self.last_old + 1 && event.new_index == self.last_new + 1
            }
        }
    }

    fn push(&mut self, event: &TextEvent) {
        self.last_old = event.old_index;
        self.last_new = event.new_index;
        self.text.push(event.ch);
    }

    fn finish(self, old: &FlatInline, config: &DiffConfig) -> Option<InlineDiff> {
        let positions = &old.positions;
        Some(match self.first.action {
            DiffAction::Added => InlineDiff::TextAdded {
                pos: positions.resolve(self.first.old_index),
                text: self.text,
                run_attrs: self.first.new_attrs,
            },
            DiffAction::Deleted => InlineDiff::TextDeleted {
                start: positions.resolve(self.first.old_index)?,
                end: positions.resolve(self.last_old + 1)?,
                text: self.text,
                run_attrs: self.first.old_attrs,
            },
            DiffAction::Modified => InlineDiff::TextModified {
                start: positions.resolve(self.first.old_index)?,
                end: positions.resolve(self.last_old + 1)?,
                text: self.text,
                run_attrs_diff: diff_attributes(
                    &self.first.old_attrs,
                    &self.first.new_attrs,
                    &config.ignored_attributes,
                )
                .unwrap_or_default(),
            },
        })
    }
}

/// Merge contiguous text events into ranges. Node events are never merged
/// and close any open range.
fn group(old: &FlatInline, config: &DiffConfig, events: Vec<Event>) -> Vec<InlineDiff> {
    let mut out = Vec::new();
    let mut run: Option<TextRun> = None;
    for event in events {
        match event {
            Event::Text(text) => match run.as_mut() {
                Some(open) if open.accepts(&text) => open.push(&text),
                _ => {
                    if let Some(done) = run.replace(TextRun::start(text)) {
                        out.extend(done.finish(old, config));
                    }
                }
            },
            Event::Node(diff) => {
                if let Some(done) = run.take() {
                    out.extend(done.finish(old, config));
                }
                out.push(diff);
            }
        }
    }
    if let Some(done) = run {
        out.extend(done.finish(old, config));
    }
    out
}

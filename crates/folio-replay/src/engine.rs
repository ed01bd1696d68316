//! Applying document diffs to a transaction.
//!
//! Records are applied from the highest old-document position down, so
//! positions of records not yet applied still refer to untouched content and
//! no position mapping is needed. Every operation is attempted on its own; a
//! failure is counted and reported as a warning.

use folio_diff::{
    apply_attributes_diff, run_attrs, AttributesDiff, DiffAction, DocumentDiff, InlineDiff,
    InlineKind, NodeDiff, TextblockDiff,
};
use folio_model::{Attrs, Mark, Node, Schema, SchemaResult, Transaction};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ReplayError;
use crate::options::ReplayOptions;

/// The outcome of a replay.
#[derive(Clone, Debug)]
pub struct ReplayResult {
    /// The transaction with every applied step.
    pub transaction: Transaction,
    pub applied_diffs: usize,
    pub skipped_diffs: usize,
    /// One entry per skipped operation.
    pub warnings: Vec<String>,
}

impl ReplayResult {
    /// Returns `true` if no operation was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped_diffs == 0
    }
}

/// Replays diff records through a schema.
pub struct ReplayEngine<'s, S: ?Sized> {
    schema: &'s S,
    options: ReplayOptions,
}

impl<'s, S: Schema + ?Sized> ReplayEngine<'s, S> {
    pub fn new(schema: &'s S) -> Self {
        Self::with_options(schema, ReplayOptions::default())
    }

    pub fn with_options(schema: &'s S, options: ReplayOptions) -> Self {
        Self { schema, options }
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Replay a document diff on a fresh transaction over `doc`.
    pub fn replay_document(&self, doc: &Node, diff: &DocumentDiff) -> ReplayResult {
        self.replay(Transaction::new(doc.clone()), &diff.doc_diffs)
    }

    /// Replay node records, given in old-document order, on a transaction.
    pub fn replay(&self, mut transaction: Transaction, diffs: &[NodeDiff]) -> ReplayResult {
        debug!(records = diffs.len(), "replay started");
        if self.options.track_changes {
            transaction.set_meta(ReplayOptions::META_KEY, json!({ "user": self.options.user }));
        }

        let mut tally = Tally::default();
        let order = back_to_front(
            diffs,
            |diff: &NodeDiff| Some(diff.pos()),
            |diff: &NodeDiff| diff.action() == DiffAction::Added,
        );
        for diff in order {
            self.apply_node_diff(&mut transaction, diff, &mut tally);
        }

        debug!(
            applied = tally.applied,
            skipped = tally.skipped,
            "replay finished"
        );
        ReplayResult {
            transaction,
            applied_diffs: tally.applied,
            skipped_diffs: tally.skipped,
            warnings: tally.warnings,
        }
    }

    fn apply_node_diff(&self, tr: &mut Transaction, diff: &NodeDiff, tally: &mut Tally) {
        let context = || format!("{} {} at {}", diff.action(), diff.node_type(), diff.pos());
        match diff {
            NodeDiff::Added { pos, node, .. } => {
                tally.record(context, self.insert_node(tr, *pos, node));
            }
            NodeDiff::Deleted { pos, node_type, .. } => {
                tally.record(context, self.delete_node(tr, *pos, node_type));
            }
            NodeDiff::Modified {
                pos,
                node_type,
                attrs_diff,
                content,
            } => {
                match attrs_diff {
                    Some(attrs) => tally.record(context, self.update_attrs(tr, *pos, node_type, attrs)),
                    None if content.is_none() => tally.record(context, Ok(())),
                    None => {}
                }
                if let Some(content) = content {
                    self.apply_content(tr, *pos, node_type, content, tally);
                }
            }
        }
    }

    fn apply_content(
        &self,
        tr: &mut Transaction,
        block_pos: usize,
        node_type: &str,
        content: &TextblockDiff,
        tally: &mut Tally,
    ) {
        let order = back_to_front(&content.inline_diffs, InlineDiff::anchor, |diff: &InlineDiff| {
            diff.action() == DiffAction::Added
        });
        for inline in order {
            let context = || {
                let kind = match inline.kind() {
                    InlineKind::Text => "text",
                    InlineKind::InlineNode => "inline node",
                };
                let at = inline.anchor().map_or_else(|| "end".to_string(), |pos| pos.to_string());
                format!("{} {kind} at {at} in {node_type} at {block_pos}", inline.action())
            };
            tally.record(context, self.apply_inline(tr, block_pos, inline));
        }
    }

    fn apply_inline(
        &self,
        tr: &mut Transaction,
        block_pos: usize,
        diff: &InlineDiff,
    ) -> Result<(), ReplayError> {
        match diff {
            InlineDiff::TextAdded {
                pos,
                text,
                run_attrs,
            } => {
                if text.is_empty() {
                    return Err(ReplayError::MissingPayload("text"));
                }
                let at = anchor_or_block_end(tr.doc(), *pos, block_pos)?;
                let marks = marks_from_run_attrs(self.schema, run_attrs)?;
                let node = self.schema.text(text, marks)?;
                tr.insert(at, vec![node])?;
            }
            InlineDiff::TextDeleted {
                start, end, text, ..
            } => {
                expect_text(tr.doc(), *start, *end, text)?;
                tr.delete(*start, *end)?;
            }
            InlineDiff::TextModified {
                start,
                end,
                text,
                run_attrs_diff,
            } => {
                let node = self.restyled_text(tr.doc(), *start, *end, text, run_attrs_diff)?;
                tr.replace_with(*start, *end, vec![node])?;
            }
            InlineDiff::NodeAdded { pos, node, .. } => {
                let at = anchor_or_block_end(tr.doc(), *pos, block_pos)?;
                self.insert_node(tr, at, node)?;
            }
            InlineDiff::NodeDeleted {
                start, node_type, ..
            } => self.delete_node(tr, *start, node_type)?,
            InlineDiff::NodeModified {
                start,
                node_type,
                new_node,
                ..
            } => {
                let size = expect_node(tr.doc(), *start, node_type)?.size();
                let node = self.schema.node_from_json(payload(new_node, "node")?)?;
                tr.replace_with(*start, *start + size, vec![node])?;
            }
        }
        Ok(())
    }

    /// The text at `[from, to)` rebuilt with its run attributes updated.
    fn restyled_text(
        &self,
        doc: &Node,
        from: usize,
        to: usize,
        text: &str,
        delta: &AttributesDiff,
    ) -> Result<Node, ReplayError> {
        expect_text(doc, from, to, text)?;
        let current = doc
            .node_at(from)
            .filter(|node| node.is_text())
            .ok_or(ReplayError::StalePosition { pos: from })?;
        let attrs = apply_attributes_diff(&run_attrs(current.marks()), delta);
        let marks = marks_from_run_attrs(self.schema, &attrs)?;
        Ok(self.schema.text(text, marks)?)
    }

    fn insert_node(&self, tr: &mut Transaction, pos: usize, json: &Value) -> Result<(), ReplayError> {
        let node = self.schema.node_from_json(payload(json, "node")?)?;
        tr.insert(pos, vec![node])?;
        Ok(())
    }

    fn delete_node(&self, tr: &mut Transaction, pos: usize, node_type: &str) -> Result<(), ReplayError> {
        let size = expect_node(tr.doc(), pos, node_type)?.size();
        tr.delete(pos, pos + size)?;
        Ok(())
    }

    fn update_attrs(
        &self,
        tr: &mut Transaction,
        pos: usize,
        node_type: &str,
        delta: &AttributesDiff,
    ) -> Result<(), ReplayError> {
        let attrs = apply_attributes_diff(expect_node(tr.doc(), pos, node_type)?.attrs(), delta);
        tr.set_node_attrs(pos, attrs)?;
        Ok(())
    }
}

/// Build a mark set from run attributes.
///
/// `true` and object values become marks; `false`, `null` and other values
/// are dropped.
pub fn marks_from_run_attrs<S: Schema + ?Sized>(schema: &S, attrs: &Attrs) -> SchemaResult<Vec<Mark>> {
    attrs
        .iter()
        .filter_map(|(name, value)| match value {
            Value::Bool(true) => Some(schema.mark(name, Attrs::new())),
            Value::Object(map) => Some(schema.mark(name, map.clone())),
            _ => None,
        })
        .collect()
}

/// Applied and skipped counts for one replay.
#[derive(Default)]
struct Tally {
    applied: usize,
    skipped: usize,
    warnings: Vec<String>,
}

impl Tally {
    fn record(&mut self, context: impl FnOnce() -> String, outcome: Result<(), ReplayError>) {
        match outcome {
            Ok(()) => self.applied += 1,
            Err(err) => {
                let warning = format!("skipped {}: {err}", context());
                warn!(warning = %warning, "replay operation skipped");
                self.skipped += 1;
                self.warnings.push(warning);
            }
        }
    }
}

/// Order records for replay: highest anchor first, unanchored records before
/// everything else. At equal anchors, records that act on the node at that
/// position go before insertions, and insertions keep their relative order
/// in the result by being applied last-first.
fn back_to_front<'a, T>(
    items: &'a [T],
    anchor: impl Fn(&T) -> Option<usize>,
    inserts: impl Fn(&T) -> bool,
) -> Vec<&'a T> {
    let mut order: Vec<(usize, &T)> = items.iter().enumerate().collect();
    order.sort_by(|&(i, a), &(j, b)| {
        let pa = anchor(a).unwrap_or(usize::MAX);
        let pb = anchor(b).unwrap_or(usize::MAX);
        pb.cmp(&pa)
            .then(inserts(a).cmp(&inserts(b)))
            .then(j.cmp(&i))
    });
    order.into_iter().map(|(_, item)| item).collect()
}

fn payload<'v>(value: &'v Value, what: &'static str) -> Result<&'v Value, ReplayError> {
    if value.is_null() {
        Err(ReplayError::MissingPayload(what))
    } else {
        Ok(value)
    }
}

fn expect_node<'d>(doc: &'d Node, pos: usize, expected: &str) -> Result<&'d Node, ReplayError> {
    let node = doc
        .node_at(pos)
        .ok_or(ReplayError::StalePosition { pos })?;
    if node.node_type() != expected {
        return Err(ReplayError::TypeMismatch {
            pos,
            expected: expected.to_string(),
            found: node.node_type().to_string(),
        });
    }
    Ok(node)
}

fn expect_text(doc: &Node, from: usize, to: usize, expected: &str) -> Result<(), ReplayError> {
    let found = doc.text_between(from, to);
    if found != expected {
        return Err(ReplayError::TextMismatch {
            from,
            to,
            expected: expected.to_string(),
            found,
        });
    }
    Ok(())
}

/// `pos`, or the end of the content of the text block at `block_pos`.
fn anchor_or_block_end(doc: &Node, pos: Option<usize>, block_pos: usize) -> Result<usize, ReplayError> {
    if let Some(pos) = pos {
        return Ok(pos);
    }
    let block = doc
        .node_at(block_pos)
        .filter(|node| node.is_textblock())
        .ok_or(ReplayError::StalePosition { pos: block_pos })?;
    Ok(block_pos + 1 + block.content_size())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::User;
    use folio_diff::{diff_documents, DiffConfig};
    use folio_model::{attrs_from, BasicSchema};
    use proptest::prelude::*;

    fn p(text: &str) -> Node {
        Node::textblock("paragraph", Attrs::new(), vec![Node::text(text, vec![])])
    }

    fn p_id(id: &str, text: &str) -> Node {
        Node::textblock(
            "paragraph",
            attrs_from(json!({ "paraId": id })),
            vec![Node::text(text, vec![])],
        )
    }

    fn quote(content: Vec<Node>) -> Node {
        Node::block("blockquote", Attrs::new(), content)
    }

    fn list(content: Vec<Node>) -> Node {
        Node::block("bulletList", Attrs::new(), content)
    }

    fn hr() -> Node {
        Node::block_leaf("horizontalRule", Attrs::new())
    }

    fn image(src: &str) -> Node {
        Node::inline_leaf("image", attrs_from(json!({ "src": src })))
    }

    fn replay(old: &Node, new: &Node) -> ReplayResult {
        let schema = BasicSchema::default();
        let diff = diff_documents(old, new, &DiffConfig::default());
        ReplayEngine::new(&schema).replay_document(old, &diff)
    }

    fn assert_converges(old: Node, new: Node) -> ReplayResult {
        let result = replay(&old, &new);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
        let replayed = result.transaction.doc();
        assert_eq!(replayed.text_content(), new.text_content());
        assert_eq!(replayed, &new);
        assert!(diff_documents(replayed, &new, &DiffConfig::default()).is_empty());
        result
    }

    #[test]
    fn inserted_words_converge() {
        let result = assert_converges(
            Node::doc(vec![p_id("p1", "Hello world")]),
            Node::doc(vec![p_id("p1", "Hello brave new world")]),
        );
        assert_eq!(result.applied_diffs, 1);
        assert_eq!(result.skipped_diffs, 0);
        assert!(result.is_clean());
    }

    #[test]
    fn replaced_paragraph_converges() {
        let result = assert_converges(
            Node::doc(vec![p("Hello world")]),
            Node::doc(vec![p("Hello brave new world")]),
        );
        assert_eq!(result.applied_diffs, 2);
    }

    #[test]
    fn mixed_block_edits_converge() {
        assert_converges(
            Node::doc(vec![
                p_id("p1", "Hello world"),
                p("remove me"),
                Node::block_leaf("horizontalRule", Attrs::new()),
                p("tail"),
            ]),
            Node::doc(vec![
                p_id("p1", "Hello brave new world"),
                Node::block_leaf("horizontalRule", Attrs::new()),
                p("tail"),
                p("added"),
            ]),
        );
    }

    #[test]
    fn wrapping_converges() {
        assert_converges(
            Node::doc(vec![p("one"), p("two")]),
            Node::doc(vec![quote(vec![p("one")]), p("two")]),
        );
    }

    #[test]
    fn unwrapping_converges() {
        assert_converges(
            Node::doc(vec![quote(vec![p("one")]), p("two")]),
            Node::doc(vec![p("one"), p("two")]),
        );
    }

    #[test]
    fn insertion_next_to_deleted_container_converges() {
        let old = Node::doc(vec![
            list(vec![p("x gamma one two"), quote(vec![hr()])]),
            list(vec![
                list(vec![p("alpha one two"), hr()]),
                quote(vec![p("gamma alpha")]),
            ]),
            hr(),
        ]);
        let new = Node::doc(vec![list(vec![hr(), p("beta delta")])]);
        let result = assert_converges(old, new);
        assert!(result.is_clean());
    }

    #[test]
    fn paragraph_moved_into_sibling_container_converges() {
        assert_converges(
            Node::doc(vec![quote(vec![p("one"), p("two")]), quote(vec![p("three")])]),
            Node::doc(vec![quote(vec![p("one")]), quote(vec![p("two"), p("three")])]),
        );
        assert_converges(
            Node::doc(vec![quote(vec![p("keep me")]), p("tail")]),
            Node::doc(vec![p("tail"), quote(vec![quote(vec![p("keep me")])])]),
        );
    }

    #[test]
    fn inserted_table_converges() {
        let table = Node::block(
            "table",
            Attrs::new(),
            vec![Node::block(
                "tableRow",
                Attrs::new(),
                vec![Node::block("tableCell", Attrs::new(), vec![p("x")])],
            )],
        );
        let result = assert_converges(Node::doc(vec![p("a")]), Node::doc(vec![p("a"), table]));
        assert_eq!(result.applied_diffs, 1);
    }

    #[test]
    fn formatting_changes_converge() {
        let bold = Node::textblock(
            "paragraph",
            Attrs::new(),
            vec![Node::text("ab", vec![Mark::new("bold")])],
        );
        assert_converges(Node::doc(vec![bold.clone()]), Node::doc(vec![p("ab")]));
        assert_converges(Node::doc(vec![p("ab")]), Node::doc(vec![bold]));

        let linked = Node::textblock(
            "paragraph",
            Attrs::new(),
            vec![
                Node::text("click ", vec![]),
                Node::text(
                    "here",
                    vec![Mark::with_attrs("link", attrs_from(json!({"href": "x"})))],
                ),
            ],
        );
        assert_converges(Node::doc(vec![p("click here")]), Node::doc(vec![linked]));
    }

    #[test]
    fn inline_node_edits_converge() {
        let with = |content| Node::doc(vec![Node::textblock("paragraph", Attrs::new(), content)]);
        assert_converges(
            with(vec![Node::text("ab", vec![])]),
            with(vec![Node::text("a", vec![]), image("x.png"), Node::text("b", vec![])]),
        );
        assert_converges(
            with(vec![Node::text("a", vec![]), image("x.png")]),
            with(vec![Node::text("a", vec![]), image("y.png")]),
        );
        assert_converges(
            with(vec![
                Node::text("a", vec![]),
                Node::inline_leaf("hardBreak", Attrs::new()),
                Node::text("b", vec![]),
            ]),
            with(vec![Node::text("ab", vec![])]),
        );
    }

    #[test]
    fn block_attribute_change_converges() {
        let heading = |level: u8| {
            Node::textblock(
                "heading",
                attrs_from(json!({ "level": level })),
                vec![Node::text("Title", vec![])],
            )
        };
        let result = assert_converges(Node::doc(vec![heading(1)]), Node::doc(vec![heading(2)]));
        assert_eq!(result.applied_diffs, 1);
    }

    #[test]
    fn text_appended_to_empty_paragraph() {
        let empty = Node::textblock("paragraph", attrs_from(json!({"paraId": "e"})), vec![]);
        assert_converges(
            Node::doc(vec![empty]),
            Node::doc(vec![p_id("e", "filled")]),
        );
    }

    #[test]
    fn unanchored_text_goes_to_block_end() {
        let schema = BasicSchema::default();
        let diffs = vec![NodeDiff::Modified {
            node_type: "paragraph".into(),
            pos: 0,
            attrs_diff: None,
            content: Some(TextblockDiff {
                old_text: "ab".into(),
                new_text: "abc".into(),
                inline_diffs: vec![InlineDiff::TextAdded {
                    pos: None,
                    text: "c".into(),
                    run_attrs: Attrs::new(),
                }],
            }),
        }];
        let result = ReplayEngine::new(&schema).replay(Transaction::new(Node::doc(vec![p("ab")])), &diffs);
        assert_eq!(result.transaction.doc().text_content(), "abc");
        assert_eq!(result.applied_diffs, 1);
    }

    #[test]
    fn stale_position_is_skipped() {
        let schema = BasicSchema::default();
        let doc = Node::doc(vec![p("a")]);
        let diffs = vec![NodeDiff::Deleted {
            node_type: "paragraph".into(),
            pos: 99,
            node: json!({"type": "paragraph"}),
            text: None,
        }];
        let result = ReplayEngine::new(&schema).replay(Transaction::new(doc.clone()), &diffs);
        assert_eq!(result.skipped_diffs, 1);
        assert_eq!(result.applied_diffs, 0);
        assert!(result.warnings[0].contains("no node at position 99"));
        assert!(!result.transaction.doc_changed());
        assert_eq!(result.transaction.doc(), &doc);
    }

    #[test]
    fn failures_do_not_stop_other_operations() {
        let schema = BasicSchema::default();
        let doc = Node::doc(vec![p("a"), p("b")]);
        let diffs = vec![
            NodeDiff::Deleted {
                node_type: "heading".into(),
                pos: 0,
                node: json!({"type": "heading"}),
                text: None,
            },
            NodeDiff::Added {
                node_type: "widget".into(),
                pos: 3,
                node: json!({"type": "widget"}),
                text: None,
            },
            NodeDiff::Added {
                node_type: "paragraph".into(),
                pos: 6,
                node: Value::Null,
                text: None,
            },
            NodeDiff::Deleted {
                node_type: "paragraph".into(),
                pos: 3,
                node: json!({"type": "paragraph"}),
                text: None,
            },
        ];
        let result = ReplayEngine::new(&schema).replay(Transaction::new(doc), &diffs);
        assert_eq!(result.applied_diffs, 1);
        assert_eq!(result.skipped_diffs, 3);
        assert_eq!(result.transaction.doc().text_content(), "a");
        assert!(result.warnings.iter().any(|w| w.contains("expected heading")));
        assert!(result.warnings.iter().any(|w| w.contains("unknown node type: widget")));
        assert!(result.warnings.iter().any(|w| w.contains("no node payload")));
    }

    #[test]
    fn mismatched_text_is_skipped() {
        let schema = BasicSchema::default();
        let diffs = vec![NodeDiff::Modified {
            node_type: "paragraph".into(),
            pos: 0,
            attrs_diff: None,
            content: Some(TextblockDiff {
                old_text: "abc".into(),
                new_text: "a".into(),
                inline_diffs: vec![InlineDiff::TextDeleted {
                    start: 2,
                    end: 4,
                    text: "xy".into(),
                    run_attrs: Attrs::new(),
                }],
            }),
        }];
        let result = ReplayEngine::new(&schema).replay(Transaction::new(Node::doc(vec![p("abc")])), &diffs);
        assert_eq!(result.skipped_diffs, 1);
        assert!(matches!(
            expect_text(result.transaction.doc(), 2, 4, "xy"),
            Err(ReplayError::TextMismatch { .. })
        ));
    }

    #[test]
    fn tracked_changes_attach_user() {
        let schema = BasicSchema::default();
        let doc = Node::doc(vec![p("a")]);
        let options = ReplayOptions::tracked(User::new("Ada", "ada@example.com"));
        let engine = ReplayEngine::with_options(&schema, options);
        let result = engine.replay(Transaction::new(doc.clone()), &[]);
        assert_eq!(
            result.transaction.meta(ReplayOptions::META_KEY),
            Some(&json!({"user": {"name": "Ada", "email": "ada@example.com"}}))
        );

        let untracked = ReplayEngine::new(&schema).replay(Transaction::new(doc), &[]);
        assert!(untracked.transaction.meta(ReplayOptions::META_KEY).is_none());
    }

    #[test]
    fn run_attrs_to_marks() {
        let schema = BasicSchema::default();
        let attrs = attrs_from(json!({
            "bold": true,
            "italic": false,
            "link": {"href": "x"},
            "strike": null
        }));
        let marks = marks_from_run_attrs(&schema, &attrs).unwrap();
        assert_eq!(
            marks,
            vec![
                Mark::new("bold"),
                Mark::with_attrs("link", attrs_from(json!({"href": "x"}))),
            ]
        );
        let unknown = attrs_from(json!({"glow": true}));
        assert!(marks_from_run_attrs(&schema, &unknown).is_err());
    }

    const WORDS: &[&str] = &["alpha", "beta", "gamma", "delta", "one", "two"];

    fn paragraph() -> impl Strategy<Value = Node> {
        prop::collection::vec(prop::sample::select(WORDS), 0..4).prop_map(|words| p(&words.join(" ")))
    }

    fn block() -> impl Strategy<Value = Node> {
        let leaf = prop_oneof![3 => paragraph(), 1 => Just(hr())];
        leaf.prop_recursive(3, 24, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(quote),
                prop::collection::vec(inner, 1..4).prop_map(list),
            ]
        })
    }

    proptest! {
        #[test]
        fn nested_edits_converge(
            old in prop::collection::vec(block(), 0..4),
            new in prop::collection::vec(block(), 0..4),
        ) {
            let (old, new) = (Node::doc(old), Node::doc(new));
            let schema = BasicSchema::default();
            let diff = diff_documents(&old, &new, &DiffConfig::default());
            prop_assert!(diff.doc_diffs.windows(2).all(|w| w[0].pos() <= w[1].pos()));

            let result = ReplayEngine::new(&schema).replay_document(&old, &diff);
            prop_assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
            let replayed = result.transaction.doc();
            prop_assert_eq!(replayed.text_content(), new.text_content());
            prop_assert_eq!(replayed, &new);
        }
    }

    #[test]
    fn ordering_puts_insertions_after_edits_at_same_anchor() {
        let items = [(5, false), (5, true), (9, false), (5, true)];
        let order = back_to_front(&items, |i| Some(i.0), |i| i.1);
        let picked: Vec<*const (usize, bool)> = order.iter().map(|i| *i as *const _).collect();
        assert_eq!(
            picked,
            vec![
                &items[2] as *const _,
                &items[0] as *const _,
                &items[3] as *const _,
                &items[1] as *const _,
            ]
        );
    }
}

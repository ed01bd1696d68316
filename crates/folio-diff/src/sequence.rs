//! Sequence diffing: edit scripts turned into typed change records.
//!
//! The same walk is used for block-level nodes and for inline tokens; only
//! the [`SequenceBuilder`] differs.

use serde::{Deserialize, Serialize};

use crate::myers::{myers_diff, EditOp};

/// What happened to an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffAction {
    Added,
    Deleted,
    Modified,
}

impl std::fmt::Display for DiffAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
        };
        f.write_str(name)
    }
}

/// An edit-script operation with cursors into both sequences.
///
/// For an insert `old_index` is the old element the insertion precedes; for a
/// delete `new_index` is the new element the deletion precedes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexedStep {
    pub op: EditOp,
    pub old_index: usize,
    pub new_index: usize,
}

/// Comparison rules and record builders for one kind of sequence element.
///
/// Builders push zero or more records into `out`; pushing nothing suppresses
/// the element.
pub trait SequenceBuilder<T> {
    type Record;

    /// Equality used by the edit script.
    fn equals(&self, old: &T, new: &T) -> bool;

    /// Whether an equal pair should still be reported as modified.
    fn modified_when_equal(&self, _old: &T, _new: &T) -> bool {
        false
    }

    /// Whether a delete directly followed by an insert is one modification.
    fn can_treat_as_modification(&self, _old: &T, _new: &T) -> bool {
        false
    }

    /// Whether two elements of the same sequence may trade places when runs
    /// of changes are slid together. The default never slides.
    fn interchangeable(&self, _a: &T, _b: &T) -> bool {
        false
    }

    /// Reorder the raw script before it is walked.
    fn reorder(&self, ops: Vec<EditOp>) -> Vec<EditOp> {
        interleave_replacements(ops)
    }

    /// A pair kept by the edit script.
    fn unchanged(&mut self, step: IndexedStep, old: &T, new: &T, out: &mut Vec<Self::Record>) {
        if self.modified_when_equal(old, new) {
            self.modified(step.old_index, step.new_index, old, new, out);
        }
    }

    fn added(&mut self, step: IndexedStep, new: &T, out: &mut Vec<Self::Record>);

    fn deleted(&mut self, step: IndexedStep, old: &T, out: &mut Vec<Self::Record>);

    fn modified(
        &mut self,
        old_index: usize,
        new_index: usize,
        old: &T,
        new: &T,
        out: &mut Vec<Self::Record>,
    );
}

/// Diff two sequences and collect the records produced by `builder`.
///
/// Records come out in old-sequence order.
pub fn diff_sequences<T, B>(old: &[T], new: &[T], builder: &mut B) -> Vec<B::Record>
where
    B: SequenceBuilder<T>,
{
    let ops = {
        let rules = &*builder;
        let ops = myers_diff(old, new, |a, b| rules.equals(a, b));
        slide_changes(&ops, old, new, |a, b| rules.interchangeable(a, b))
    };
    let steps = index_steps(&builder.reorder(ops));

    let mut records = Vec::new();
    let mut i = 0;
    while i < steps.len() {
        let step = steps[i];
        match step.op {
            EditOp::Equal => {
                builder.unchanged(step, &old[step.old_index], &new[step.new_index], &mut records);
            }
            EditOp::Delete => {
                let o = &old[step.old_index];
                let paired = steps
                    .get(i + 1)
                    .filter(|next| next.op == EditOp::Insert)
                    .filter(|next| builder.can_treat_as_modification(o, &new[next.new_index]));
                if let Some(next) = paired {
                    let n = &new[next.new_index];
                    builder.modified(step.old_index, next.new_index, o, n, &mut records);
                    i += 2;
                    continue;
                }
                builder.deleted(step, o, &mut records);
            }
            EditOp::Insert => {
                builder.added(step, &new[step.new_index], &mut records);
            }
        }
        i += 1;
    }
    records
}

/// Slide runs of changes so that runs separated only by repeated elements
/// merge, then rebuild the script with deletions ahead of insertions at each
/// point.
///
/// Each run is moved up as far as it goes (merging with earlier runs) and
/// then down as far as it goes; the lowest position wins. Moving a run never
/// changes the number of edits.
pub fn slide_changes<T, F>(ops: &[EditOp], old: &[T], new: &[T], mut same: F) -> Vec<EditOp>
where
    F: FnMut(&T, &T) -> bool,
{
    let mut removed = vec![false; old.len()];
    let mut added = vec![false; new.len()];
    for step in index_steps(ops) {
        match step.op {
            EditOp::Delete => removed[step.old_index] = true,
            EditOp::Insert => added[step.new_index] = true,
            EditOp::Equal => {}
        }
    }
    slide_runs(&mut removed, old, &mut same);
    slide_runs(&mut added, new, &mut same);

    let mut out = Vec::with_capacity(ops.len());
    let (mut i, mut j) = (0, 0);
    loop {
        if removed.get(i) == Some(&true) {
            out.push(EditOp::Delete);
            i += 1;
        } else if added.get(j) == Some(&true) {
            out.push(EditOp::Insert);
            j += 1;
        } else if i < old.len() && j < new.len() {
            out.push(EditOp::Equal);
            i += 1;
            j += 1;
        } else {
            break;
        }
    }
    out
}

fn slide_runs<T, F>(changed: &mut [bool], tokens: &[T], same: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let mut start = 0;
    while start < changed.len() {
        if !changed[start] {
            start += 1;
            continue;
        }
        let mut end = run_end(changed, start);
        loop {
            while start > 0 && same(&tokens[start - 1], &tokens[end - 1]) {
                changed[start - 1] = true;
                changed[end - 1] = false;
                end -= 1;
                start = run_start(changed, start - 1);
            }
            let size = end - start;
            while end < tokens.len() && same(&tokens[start], &tokens[end]) {
                changed[start] = false;
                changed[end] = true;
                start += 1;
                end = run_end(changed, end);
            }
            // Merging with a later run may allow sliding further up.
            if end - start == size {
                break;
            }
        }
        start = end;
    }
}

fn run_start(changed: &[bool], mut at: usize) -> usize {
    while at > 0 && changed[at - 1] {
        at -= 1;
    }
    at
}

fn run_end(changed: &[bool], mut at: usize) -> usize {
    while at < changed.len() && changed[at] {
        at += 1;
    }
    at
}

/// Attach old/new cursors to each operation.
pub fn index_steps(ops: &[EditOp]) -> Vec<IndexedStep> {
    let mut old_index = 0;
    let mut new_index = 0;
    ops.iter()
        .map(|&op| {
            let step = IndexedStep {
                op,
                old_index,
                new_index,
            };
            match op {
                EditOp::Equal => {
                    old_index += 1;
                    new_index += 1;
                }
                EditOp::Delete => old_index += 1,
                EditOp::Insert => new_index += 1,
            }
            step
        })
        .collect()
}

/// Interleave each delete run with the insert run that follows it.
///
/// `D D I I` becomes `D I D I`, so replacements line up index for index.
/// Unpaired leftovers keep their relative order after the pairs.
pub fn interleave_replacements(ops: Vec<EditOp>) -> Vec<EditOp> {
    let mut out = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        if ops[i] != EditOp::Delete {
            out.push(ops[i]);
            i += 1;
            continue;
        }
        let deletes = ops[i..].iter().take_while(|op| **op == EditOp::Delete).count();
        let inserts = ops[i + deletes..]
            .iter()
            .take_while(|op| **op == EditOp::Insert)
            .count();
        let pairs = deletes.min(inserts);
        for _ in 0..pairs {
            out.push(EditOp::Delete);
            out.push(EditOp::Insert);
        }
        out.extend(std::iter::repeat(EditOp::Delete).take(deletes - pairs));
        out.extend(std::iter::repeat(EditOp::Insert).take(inserts - pairs));
        i += deletes + inserts;
    }
    out
}

/// A stretch of the script: unchanged elements or a block of changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stretch {
    Same(usize),
    Changed { deleted: usize, inserted: usize },
}

/// Fold short unchanged stretches into the changes around them.
///
/// An unchanged stretch with changes on both sides that is no longer than
/// the larger side of either neighbour becomes a deletion plus an insertion.
/// Every block of changes is written with its deletions first. The result
/// may be longer than the input but reads as whole replacements.
pub fn absorb_short_equalities(ops: &[EditOp]) -> Vec<EditOp> {
    let mut stretches: Vec<Stretch> = Vec::new();
    for &op in ops {
        match (stretches.last_mut(), op) {
            (Some(Stretch::Same(len)), EditOp::Equal) => *len += 1,
            (Some(Stretch::Changed { deleted, .. }), EditOp::Delete) => *deleted += 1,
            (Some(Stretch::Changed { inserted, .. }), EditOp::Insert) => *inserted += 1,
            (_, EditOp::Equal) => stretches.push(Stretch::Same(1)),
            (_, EditOp::Delete) => stretches.push(Stretch::Changed { deleted: 1, inserted: 0 }),
            (_, EditOp::Insert) => stretches.push(Stretch::Changed { deleted: 0, inserted: 1 }),
        }
    }

    let mut merged = true;
    while merged {
        merged = false;
        let mut i = 1;
        while i + 1 < stretches.len() {
            if let (
                Stretch::Changed { deleted: d0, inserted: i0 },
                Stretch::Same(len),
                Stretch::Changed { deleted: d1, inserted: i1 },
            ) = (stretches[i - 1], stretches[i], stretches[i + 1])
            {
                if len <= d0.max(i0) && len <= d1.max(i1) {
                    let joined = Stretch::Changed {
                        deleted: d0 + len + d1,
                        inserted: i0 + len + i1,
                    };
                    stretches.splice(i - 1..=i + 1, [joined]);
                    merged = true;
                    continue;
                }
            }
            i += 1;
        }
    }

    let mut out = Vec::with_capacity(ops.len());
    for stretch in stretches {
        match stretch {
            Stretch::Same(len) => out.extend(std::iter::repeat(EditOp::Equal).take(len)),
            Stretch::Changed { deleted, inserted } => {
                out.extend(std::iter::repeat(EditOp::Delete).take(deleted));
                out.extend(std::iter::repeat(EditOp::Insert).take(inserted));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::myers::EditOp::{Delete as D, Equal as E, Insert as I};

    /// Records each callback as a short string.
    struct Recorder {
        pair_when: fn(char, char) -> bool,
        modify_equal: bool,
        slide: bool,
    }

    impl Recorder {
        fn new(pair_when: fn(char, char) -> bool) -> Self {
            Self {
                pair_when,
                modify_equal: false,
                slide: false,
            }
        }
    }

    impl SequenceBuilder<(char, u8)> for Recorder {
        type Record = String;

        fn equals(&self, old: &(char, u8), new: &(char, u8)) -> bool {
            old.0 == new.0
        }

        fn modified_when_equal(&self, old: &(char, u8), new: &(char, u8)) -> bool {
            self.modify_equal && old.1 != new.1
        }

        fn can_treat_as_modification(&self, old: &(char, u8), new: &(char, u8)) -> bool {
            (self.pair_when)(old.0, new.0)
        }

        fn interchangeable(&self, a: &(char, u8), b: &(char, u8)) -> bool {
            self.slide && a == b
        }

        fn added(&mut self, step: IndexedStep, new: &(char, u8), out: &mut Vec<String>) {
            out.push(format!("+{}@{}", new.0, step.old_index));
        }

        fn deleted(&mut self, step: IndexedStep, old: &(char, u8), out: &mut Vec<String>) {
            if old.0 != '#' {
                out.push(format!("-{}@{}", old.0, step.old_index));
            }
        }

        fn modified(
            &mut self,
            o: usize,
            n: usize,
            old: &(char, u8),
            new: &(char, u8),
            out: &mut Vec<String>,
        ) {
            out.push(format!("~{}{}@{}:{}", old.0, new.0, o, n));
        }
    }

    fn seq(s: &str) -> Vec<(char, u8)> {
        s.chars().map(|c| (c, 0)).collect()
    }

    fn never(_: char, _: char) -> bool {
        false
    }

    fn always(_: char, _: char) -> bool {
        true
    }

    #[test]
    fn interleaves_delete_and_insert_runs() {
        assert_eq!(interleave_replacements(vec![D, D, I, I]), vec![D, I, D, I]);
        assert_eq!(interleave_replacements(vec![E, D, D, D, I, E]), vec![E, D, I, D, D, E]);
        assert_eq!(interleave_replacements(vec![D, I, I, I]), vec![D, I, I, I]);
        assert_eq!(interleave_replacements(vec![I, D]), vec![I, D]);
    }

    #[test]
    fn steps_carry_cursors() {
        let steps = index_steps(&[E, D, I, E]);
        let cursors: Vec<(usize, usize)> = steps.iter().map(|s| (s.old_index, s.new_index)).collect();
        assert_eq!(cursors, vec![(0, 0), (1, 1), (2, 1), (2, 2)]);
    }

    #[test]
    fn plain_additions_and_deletions() {
        let mut b = Recorder::new(never);
        let records = diff_sequences(&seq("abc"), &seq("axc"), &mut b);
        assert_eq!(records, vec!["-b@1", "+x@2"]);
    }

    #[test]
    fn delete_insert_pairs_become_modifications() {
        let mut b = Recorder::new(always);
        let records = diff_sequences(&seq("abcd"), &seq("axyd"), &mut b);
        assert_eq!(records, vec!["~bx@1:1", "~cy@2:2"]);
    }

    #[test]
    fn equal_pairs_can_be_modifications() {
        let mut b = Recorder { modify_equal: true, ..Recorder::new(never) };
        let old = vec![('a', 0), ('b', 0)];
        let new = vec![('a', 0), ('b', 1)];
        assert_eq!(diff_sequences(&old, &new, &mut b), vec!["~bb@1:1"]);
    }

    #[test]
    fn builders_can_suppress_records() {
        let mut b = Recorder::new(never);
        let records = diff_sequences(&seq("a#b"), &seq("ab"), &mut b);
        assert!(records.is_empty());
    }

    #[test]
    fn identical_sequences_produce_nothing() {
        let mut b = Recorder { modify_equal: true, ..Recorder::new(always) };
        assert!(diff_sequences(&seq("same"), &seq("same"), &mut b).is_empty());
    }

    #[test]
    fn sliding_merges_runs_split_by_repeats() {
        let (old, new) = (seq("Hello world"), seq("Hello brave new world"));

        let mut plain = Recorder::new(never);
        let split = diff_sequences(&old, &new, &mut plain);
        assert_eq!(split.len(), 10);
        assert!(split.iter().any(|r| r.ends_with("@7")));

        let mut sliding = Recorder {
            slide: true,
            ..Recorder::new(never)
        };
        let merged = diff_sequences(&old, &new, &mut sliding);
        let text: String = merged.iter().filter_map(|r| r.chars().nth(1)).collect();
        assert_eq!(text, "brave new ");
        assert!(merged.iter().all(|r| r.ends_with("@6")));
    }

    #[test]
    fn sliding_keeps_edit_count() {
        let old: Vec<char> = "abab".chars().collect();
        let new: Vec<char> = "ab".chars().collect();
        let ops = myers_diff(&old, &new, |a, b| a == b);
        let slid = slide_changes(&ops, &old, &new, |a, b| a == b);
        assert_eq!(slid.iter().filter(|op| **op != E).count(), 2);
        assert_eq!(slid, vec![E, E, D, D]);
    }

    #[test]
    fn short_equalities_between_changes_are_absorbed() {
        // "world" -> "there" keeps only the 'r'.
        let ops = vec![E, D, D, I, I, I, E, D, D, I];
        assert_eq!(
            absorb_short_equalities(&ops),
            vec![E, D, D, D, D, D, I, I, I, I, I]
        );
    }

    #[test]
    fn long_or_edge_equalities_are_kept() {
        assert_eq!(absorb_short_equalities(&[D, E, E, I]), vec![D, E, E, I]);
        assert_eq!(absorb_short_equalities(&[E, D, I, E]), vec![E, D, I, E]);
        assert_eq!(absorb_short_equalities(&[I, D, E]), vec![D, I, E]);
    }

    #[test]
    fn absorbing_cascades() {
        // Merging the first gap makes the second one short enough.
        let ops = vec![D, D, E, D, E, E, E, I, I, I];
        assert_eq!(
            absorb_short_equalities(&ops),
            vec![D, D, D, D, D, D, D, I, I, I, I, I, I, I]
        );
    }

    #[test]
    fn display_action() {
        assert_eq!(DiffAction::Added.to_string(), "added");
        assert_eq!(DiffAction::Modified.to_string(), "modified");
    }
}

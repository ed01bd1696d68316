//! Mapping from flattened token indices back to document positions.

/// A contiguous run of tokens that occupy consecutive document positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PositionEntry {
    start: usize,
    end: usize,
    pos: usize,
}

/// Sorted `(token range, document position)` entries with binary-search
/// lookup.
///
/// Built while a textblock is flattened; the index one past the last token
/// resolves to the end of the block's content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionIndex {
    entries: Vec<PositionEntry>,
    len: usize,
    end: usize,
}

impl PositionIndex {
    /// An empty index whose content ends at `content_end`.
    pub fn new(content_end: usize) -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
            end: content_end,
        }
    }

    /// Append `len` tokens starting at document position `pos`.
    pub fn push(&mut self, len: usize, pos: usize) {
        if len == 0 {
            return;
        }
        self.entries.push(PositionEntry {
            start: self.len,
            end: self.len + len,
            pos,
        });
        self.len += len;
    }

    /// Number of indexed tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Document position where the indexed content ends.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Document position of the token at `index`.
    ///
    /// `index == len()` resolves to [`PositionIndex::end`]; anything past that
    /// is `None`.
    pub fn resolve(&self, index: usize) -> Option<usize> {
        if index == self.len {
            return Some(self.end);
        }
        let at = self.entries.partition_point(|e| e.end <= index);
        self.entries
            .get(at)
            .filter(|e| e.start <= index)
            .map(|e| e.pos + (index - e.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_within_runs() {
        // "ab" at 1, an image at 3, "cd" at 4; content ends at 6.
        let mut index = PositionIndex::new(6);
        index.push(2, 1);
        index.push(1, 3);
        index.push(2, 4);
        assert_eq!(index.len(), 5);
        assert_eq!(index.resolve(0), Some(1));
        assert_eq!(index.resolve(1), Some(2));
        assert_eq!(index.resolve(2), Some(3));
        assert_eq!(index.resolve(4), Some(5));
    }

    #[test]
    fn one_past_the_end_is_content_end() {
        let mut index = PositionIndex::new(9);
        index.push(3, 6);
        assert_eq!(index.resolve(3), Some(9));
        assert_eq!(index.resolve(4), None);
    }

    #[test]
    fn empty_index() {
        let index = PositionIndex::new(1);
        assert!(index.is_empty());
        assert_eq!(index.resolve(0), Some(1));
        assert_eq!(index.resolve(1), None);
    }

    #[test]
    fn zero_length_runs_are_skipped() {
        let mut index = PositionIndex::new(3);
        index.push(0, 1);
        index.push(2, 1);
        assert_eq!(index.resolve(0), Some(1));
        assert_eq!(index.resolve(1), Some(2));
    }
}

//! Transactions: ordered edit steps applied to a document.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::attrs::Attrs;
use crate::error::{StepError, StepResult};
use crate::mark::Mark;
use crate::node::Node;

/// A single edit operation against a document.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Replace the range `[from, to)` with `content`.
    ///
    /// Both ends must lie in the same parent; `content` must be allowed there.
    Replace {
        from: usize,
        to: usize,
        content: Vec<Node>,
    },
    /// Replace the attributes of the node starting at `pos`, keeping its marks.
    SetNodeAttrs { pos: usize, attrs: Attrs },
    /// Add a mark to every text node in `[from, to)`.
    AddMark { from: usize, to: usize, mark: Mark },
    /// Remove marks of a type from every text node in `[from, to)`.
    RemoveMark {
        from: usize,
        to: usize,
        mark_type: String,
    },
}

impl Step {
    /// Apply the step to a document, producing a new document.
    pub fn apply(&self, doc: &Node) -> StepResult<Node> {
        match self {
            Self::Replace { from, to, content } => replace(doc, *from, *to, content),
            Self::SetNodeAttrs { pos, attrs } => map_node_at(doc, *pos, *pos, |node| {
                if node.is_text() {
                    Err(StepError::TextNode(*pos))
                } else {
                    Ok(node.with_attrs(attrs.clone()))
                }
            }),
            Self::AddMark { from, to, mark } => {
                check_range(doc, *from, *to)?;
                Ok(update_marks(doc, *from, *to, &|marks| mark.add_to_set(marks)))
            }
            Self::RemoveMark {
                from,
                to,
                mark_type,
            } => {
                check_range(doc, *from, *to)?;
                Ok(update_marks(doc, *from, *to, &|marks| {
                    Mark::remove_from_set(mark_type, marks)
                }))
            }
        }
    }
}

/// An evolving document together with the steps that produced it.
///
/// A step that fails leaves the transaction untouched.
#[derive(Clone, Debug)]
pub struct Transaction {
    before: Node,
    doc: Node,
    steps: Vec<Step>,
    meta: BTreeMap<String, Value>,
}

impl Transaction {
    /// Start a transaction on a document.
    pub fn new(doc: Node) -> Self {
        Self {
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    /// The document before any step was applied.
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// The current document.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    /// The applied steps, in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns `true` if at least one step was applied.
    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Apply a step.
    pub fn step(&mut self, step: Step) -> StepResult<&mut Self> {
        self.doc = step.apply(&self.doc)?;
        debug!(steps = self.steps.len() + 1, "transaction step applied");
        self.steps.push(step);
        Ok(self)
    }

    /// Insert nodes at a position.
    pub fn insert(&mut self, pos: usize, content: Vec<Node>) -> StepResult<&mut Self> {
        self.replace_with(pos, pos, content)
    }

    /// Delete the range `[from, to)`.
    pub fn delete(&mut self, from: usize, to: usize) -> StepResult<&mut Self> {
        self.replace_with(from, to, Vec::new())
    }

    /// Replace the range `[from, to)` with nodes.
    pub fn replace_with(&mut self, from: usize, to: usize, content: Vec<Node>) -> StepResult<&mut Self> {
        self.step(Step::Replace { from, to, content })
    }

    /// Replace the attributes of the node at `pos`.
    pub fn set_node_attrs(&mut self, pos: usize, attrs: Attrs) -> StepResult<&mut Self> {
        self.step(Step::SetNodeAttrs { pos, attrs })
    }

    /// Add a mark over a range.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> StepResult<&mut Self> {
        self.step(Step::AddMark { from, to, mark })
    }

    /// Remove a mark type over a range.
    pub fn remove_mark(&mut self, from: usize, to: usize, mark_type: &str) -> StepResult<&mut Self> {
        self.step(Step::RemoveMark {
            from,
            to,
            mark_type: mark_type.to_string(),
        })
    }

    /// Attach metadata for downstream consumers.
    pub fn set_meta(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Read metadata.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }
}

fn check_range(parent: &Node, from: usize, to: usize) -> StepResult<()> {
    if from > to {
        return Err(StepError::InvalidRange { from, to });
    }
    let size = parent.content_size();
    if to > size {
        return Err(StepError::OutOfRange { pos: to, size });
    }
    Ok(())
}

fn replace(parent: &Node, from: usize, to: usize, insert: &[Node]) -> StepResult<Node> {
    check_range(parent, from, to)?;

    // Descend while the whole range sits inside one child's content.
    let mut offset = 0;
    for (index, child) in parent.content().iter().enumerate() {
        let end = offset + child.size();
        if !child.is_leaf() && from > offset && to < end {
            let replaced = replace(child, from - offset - 1, to - offset - 1, insert)?;
            let mut content = parent.content().to_vec();
            content[index] = replaced;
            return Ok(parent.with_content(content));
        }
        if offset > to {
            break;
        }
        offset = end;
    }

    if let Some(node) = insert.iter().find(|n| !parent.kind().accepts(n.kind())) {
        return Err(StepError::InvalidContent {
            parent: parent.node_type().to_string(),
            child: node.node_type().to_string(),
        });
    }

    let mut out = Vec::with_capacity(parent.content().len() + insert.len());
    let mut inserted = false;
    let mut offset = 0;
    for child in parent.content() {
        let end = offset + child.size();
        if end <= from {
            out.push(child.clone());
        } else if offset >= to {
            if !inserted {
                out.extend_from_slice(insert);
                inserted = true;
            }
            out.push(child.clone());
        } else if child.is_text() {
            if from > offset {
                out.push(child.cut_text(0, from - offset));
            }
            if !inserted {
                out.extend_from_slice(insert);
                inserted = true;
            }
            if to < end {
                out.push(child.cut_text(to - offset, child.size()));
            }
        } else {
            if offset < from || end > to {
                return Err(StepError::CrossesNode {
                    from,
                    to,
                    node_type: child.node_type().to_string(),
                });
            }
            if !inserted {
                out.extend_from_slice(insert);
                inserted = true;
            }
        }
        offset = end;
    }
    if !inserted {
        out.extend_from_slice(insert);
    }
    Ok(parent.with_content(out))
}

fn map_node_at<F>(parent: &Node, pos: usize, original: usize, f: F) -> StepResult<Node>
where
    F: FnOnce(&Node) -> StepResult<Node>,
{
    let mut offset = 0;
    for (index, child) in parent.content().iter().enumerate() {
        let end = offset + child.size();
        if pos == offset || pos < end {
            let replaced = if pos == offset {
                f(child)?
            } else if child.is_leaf() {
                return Err(StepError::NoNodeAt(original));
            } else {
                map_node_at(child, pos - offset - 1, original, f)?
            };
            let mut content = parent.content().to_vec();
            content[index] = replaced;
            return Ok(parent.with_content(content));
        }
        offset = end;
    }
    Err(StepError::NoNodeAt(original))
}

fn update_marks(parent: &Node, from: usize, to: usize, f: &dyn Fn(&[Mark]) -> Vec<Mark>) -> Node {
    let mut out = Vec::with_capacity(parent.content().len());
    let mut offset = 0;
    for child in parent.content() {
        let end = offset + child.size();
        if end <= from || offset >= to {
            out.push(child.clone());
        } else if child.is_text() {
            let start = from.saturating_sub(offset);
            let stop = (to - offset).min(child.size());
            if start > 0 {
                out.push(child.cut_text(0, start));
            }
            let middle = child.cut_text(start, stop);
            out.push(middle.with_marks(f(child.marks())));
            if stop < child.size() {
                out.push(child.cut_text(stop, child.size()));
            }
        } else if child.is_leaf() {
            out.push(child.clone());
        } else {
            let inner_from = from.saturating_sub(offset + 1);
            let inner_to = to.saturating_sub(offset + 1).min(child.content_size());
            out.push(update_marks(child, inner_from, inner_to, f));
        }
        offset = end;
    }
    parent.with_content(out)
}

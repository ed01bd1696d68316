use serde_json::{Map, Value};

use crate::attrs::Attrs;

/// A named, attributed decoration applied to inline content.
#[derive(Clone, Debug, PartialEq)]
pub struct Mark {
    mark_type: String,
    attrs: Attrs,
}

impl Mark {
    /// Create a mark without attributes.
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: Attrs::new(),
        }
    }

    /// Create a mark carrying an attribute dictionary.
    pub fn with_attrs(mark_type: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs,
        }
    }

    /// The mark type name.
    pub fn mark_type(&self) -> &str {
        &self.mark_type
    }

    /// The mark's attributes.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Canonical JSON form: `{type, attrs?}`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.mark_type.clone()));
        if !self.attrs.is_empty() {
            obj.insert("attrs".into(), Value::Object(self.attrs.clone()));
        }
        Value::Object(obj)
    }

    /// Add this mark to a set, replacing any mark of the same type.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut out: Vec<Mark> = set
            .iter()
            .filter(|m| m.mark_type != self.mark_type)
            .cloned()
            .collect();
        out.push(self.clone());
        Self::normalize_set(out)
    }

    /// Remove every mark of `mark_type` from a set.
    pub fn remove_from_set(mark_type: &str, set: &[Mark]) -> Vec<Mark> {
        set.iter()
            .filter(|m| m.mark_type != mark_type)
            .cloned()
            .collect()
    }

    /// Sort a mark set by type name and keep one mark per type (last wins).
    pub fn normalize_set(marks: Vec<Mark>) -> Vec<Mark> {
        let mut out: Vec<Mark> = Vec::with_capacity(marks.len());
        for mark in marks {
            match out.iter_mut().find(|m| m.mark_type == mark.mark_type) {
                Some(existing) => *existing = mark,
                None => out.push(mark),
            }
        }
        out.sort_by(|a, b| a.mark_type.cmp(&b.mark_type));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::attrs_from;
    use serde_json::json;

    #[test]
    fn json_omits_empty_attrs() {
        assert_eq!(Mark::new("bold").to_json(), json!({"type": "bold"}));
        let link = Mark::with_attrs("link", attrs_from(json!({"href": "x"})));
        assert_eq!(
            link.to_json(),
            json!({"type": "link", "attrs": {"href": "x"}})
        );
    }

    #[test]
    fn add_replaces_same_type() {
        let set = vec![
            Mark::with_attrs("link", attrs_from(json!({"href": "a"}))),
            Mark::new("bold"),
        ];
        let updated = Mark::with_attrs("link", attrs_from(json!({"href": "b"}))).add_to_set(&set);
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].mark_type(), "bold");
        assert_eq!(updated[1].attrs().get("href"), Some(&json!("b")));
    }

    #[test]
    fn remove_drops_type() {
        let set = vec![Mark::new("bold"), Mark::new("italic")];
        let updated = Mark::remove_from_set("bold", &set);
        assert_eq!(updated, vec![Mark::new("italic")]);
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let set = Mark::normalize_set(vec![
            Mark::new("italic"),
            Mark::new("bold"),
            Mark::new("italic"),
        ]);
        assert_eq!(set, vec![Mark::new("bold"), Mark::new("italic")]);
    }
}

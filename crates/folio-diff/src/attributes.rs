//! Attribute-level diff: compare two attribute dictionaries.
//!
//! Nested objects are flattened into dotted paths (`"margins.header"`), so a
//! change deep inside an object is reported as a single entry instead of a
//! replacement of the whole parent value.

use std::collections::{BTreeMap, BTreeSet};

use folio_model::Attrs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value that changed between the old and the new dictionary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub from: Value,
    pub to: Value,
}

/// Differences between two attribute dictionaries, keyed by dotted path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributesDiff {
    /// Paths present only in the new dictionary.
    pub added: BTreeMap<String, Value>,
    /// Paths present only in the old dictionary.
    pub deleted: BTreeMap<String, Value>,
    /// Paths present in both with different values.
    pub modified: BTreeMap<String, ValueChange>,
}

impl AttributesDiff {
    /// Returns `true` if no bucket has an entry.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    /// Total number of entries across the three buckets.
    pub fn len(&self) -> usize {
        self.added.len() + self.deleted.len() + self.modified.len()
    }
}

/// Compare two attribute dictionaries.
///
/// Keys in `ignored` are skipped at every nesting level. Only non-empty
/// objects on both sides are descended into; anything else is compared as a
/// whole value. Returns `None` when nothing differs.
pub fn diff_attributes(
    old: &Attrs,
    new: &Attrs,
    ignored: &BTreeSet<String>,
) -> Option<AttributesDiff> {
    let mut diff = AttributesDiff::default();
    compare_objects(old, new, "", ignored, &mut diff);
    (!diff.is_empty()).then_some(diff)
}

fn compare_objects(
    old: &Attrs,
    new: &Attrs,
    prefix: &str,
    ignored: &BTreeSet<String>,
    diff: &mut AttributesDiff,
) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        if ignored.contains(key.as_str()) {
            continue;
        }
        let path = join(prefix, key);
        match (old.get(key), new.get(key)) {
            (Some(from), None) => flatten(from, path, ignored, &mut diff.deleted),
            (None, Some(to)) => flatten(to, path, ignored, &mut diff.added),
            (Some(from), Some(to)) => match (nested(from), nested(to)) {
                (Some(a), Some(b)) => compare_objects(a, b, &path, ignored, diff),
                _ if from != to => {
                    diff.modified.insert(
                        path,
                        ValueChange {
                            from: from.clone(),
                            to: to.clone(),
                        },
                    );
                }
                _ => {}
            },
            (None, None) => {}
        }
    }
}

/// Record `value` under `path`, expanding non-empty objects key by key.
fn flatten(
    value: &Value,
    path: String,
    ignored: &BTreeSet<String>,
    out: &mut BTreeMap<String, Value>,
) {
    match nested(value) {
        Some(map) => {
            for (key, child) in map {
                if !ignored.contains(key.as_str()) {
                    flatten(child, join(&path, key), ignored, out);
                }
            }
        }
        None => {
            out.insert(path, value.clone());
        }
    }
}

/// A non-empty object; empty objects are leaf values.
fn nested(value: &Value) -> Option<&Attrs> {
    value.as_object().filter(|map| !map.is_empty())
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Apply a diff to an attribute dictionary.
///
/// Deletions go first and prune parent objects they leave empty, then
/// modifications, then additions, which create missing intermediate objects.
pub fn apply_attributes_diff(attrs: &Attrs, diff: &AttributesDiff) -> Attrs {
    let mut out = attrs.clone();
    for path in diff.deleted.keys() {
        remove_path(&mut out, &split(path));
    }
    for (path, change) in &diff.modified {
        set_path(&mut out, &split(path), change.to.clone());
    }
    for (path, value) in &diff.added {
        set_path(&mut out, &split(path), value.clone());
    }
    out
}

fn split(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

fn remove_path(map: &mut Attrs, path: &[&str]) {
    match path {
        [] => {}
        [key] => {
            map.remove(*key);
        }
        [key, rest @ ..] => {
            let emptied = match map.get_mut(*key) {
                Some(Value::Object(child)) => {
                    remove_path(child, rest);
                    child.is_empty()
                }
                _ => false,
            };
            if emptied {
                map.remove(*key);
            }
        }
    }
}

fn set_path(map: &mut Attrs, path: &[&str], value: Value) {
    match path {
        [] => {}
        [key] => {
            map.insert(key.to_string(), value);
        }
        [key, rest @ ..] => {
            let slot = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Attrs::new()));
            if !slot.is_object() {
                *slot = Value::Object(Attrs::new());
            }
            if let Value::Object(child) = slot {
                set_path(child, rest, value);
            }
        }
    }
}

//! Attribute dictionaries shared by nodes and marks.

use serde_json::Value;

/// A node or mark attribute dictionary.
///
/// `serde_json::Map` keeps keys sorted, so two equal dictionaries always
/// serialize to the same string.
pub type Attrs = serde_json::Map<String, Value>;

/// Convert a JSON value into an attribute dictionary.
///
/// Objects are taken as-is; every other value yields an empty dictionary.
pub fn attrs_from(value: Value) -> Attrs {
    match value {
        Value::Object(map) => map,
        _ => Attrs::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_is_taken_verbatim() {
        let attrs = attrs_from(json!({"level": 2, "id": "a"}));
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("level"), Some(&json!(2)));
    }

    #[test]
    fn non_object_is_empty() {
        assert!(attrs_from(json!(null)).is_empty());
        assert!(attrs_from(json!([1, 2])).is_empty());
    }

    #[test]
    fn keys_serialize_sorted() {
        let a = attrs_from(json!({"b": 1, "a": 2}));
        let b = attrs_from(json!({"a": 2, "b": 1}));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

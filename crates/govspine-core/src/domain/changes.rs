//! Field-level change sets
//!
//! An audit entry's `changes` column is a map from field name to the
//! old/new pair. Values are compared by their serialized form, so nested
//! objects and arrays are compared deeply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Old and new value of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    pub fn new(old: Value, new: Value) -> Self {
        Self { old, new }
    }
}

/// Changes keyed by field name, ordered for stable serialization
pub type Changes = BTreeMap<String, FieldChange>;

/// Builds the change set for a newly created record: every field goes
/// from `null` to its value.
pub fn creation_changes(data: &Map<String, Value>) -> Changes {
    data.iter()
        .map(|(key, value)| (key.clone(), FieldChange::new(Value::Null, value.clone())))
        .collect()
}

/// Computes the fields of `new` whose value differs from `old`.
///
/// A field missing from `old` is a change even when `new` sets it to
/// `null`; its old value is reported as `null`. Fields present only in
/// `old` are not reported.
pub fn diff_fields(old: &Map<String, Value>, new: &Map<String, Value>) -> Changes {
    let mut changes = Changes::new();
    for (key, new_value) in new {
        let changed = match old.get(key) {
            Some(old_value) => !same_serialized(old_value, new_value),
            None => true,
        };
        if changed {
            let old_value = old.get(key).cloned().unwrap_or(Value::Null);
            changes.insert(key.clone(), FieldChange::new(old_value, new_value.clone()));
        }
    }
    changes
}

/// Compares two JSON values as their key-sorted serialized text would.
///
/// Object key order is ignored; `1` and `1.0` are different values.
pub fn same_serialized(a: &Value, b: &Value) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_creation_changes_sets_old_to_null() {
        let changes = creation_changes(&obj(json!({"name": "A", "designation": "X"})));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes["name"], FieldChange::new(Value::Null, json!("A")));
        assert_eq!(
            changes["designation"],
            FieldChange::new(Value::Null, json!("X"))
        );
    }

    #[test]
    fn test_diff_reports_only_changed_fields() {
        let old = obj(json!({"name": "A", "designation": "X"}));
        let new = obj(json!({"name": "B", "designation": "X"}));

        let changes = diff_fields(&old, &new);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes["name"], FieldChange::new(json!("A"), json!("B")));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let data = obj(json!({"name": "A", "tags": ["x", "y"]}));
        assert!(diff_fields(&data, &data.clone()).is_empty());
    }

    #[test]
    fn test_diff_is_deep() {
        let old = obj(json!({"dims": {"w": 1, "h": 2}}));
        let new = obj(json!({"dims": {"w": 1, "h": 3}}));

        let changes = diff_fields(&old, &new);
        assert_eq!(changes["dims"].old, json!({"w": 1, "h": 2}));
        assert_eq!(changes["dims"].new, json!({"w": 1, "h": 3}));
    }

    #[test]
    fn test_diff_new_field_counts_as_change_from_null() {
        let old = obj(json!({"name": "A"}));
        let new = obj(json!({"name": "A", "weight": 12.5}));

        let changes = diff_fields(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["weight"].old, Value::Null);
    }

    #[test]
    fn test_diff_reports_new_field_set_to_null() {
        let old = obj(json!({"name": "A"}));
        let new = obj(json!({"name": "A", "note": null}));

        let changes = diff_fields(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["note"], FieldChange::new(Value::Null, Value::Null));

        // an existing null that stays null is unchanged
        let old = obj(json!({"name": "A", "note": null}));
        assert!(diff_fields(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_ignores_fields_only_in_old() {
        let old = obj(json!({"name": "A", "legacy": true}));
        let new = obj(json!({"name": "A"}));

        assert!(diff_fields(&old, &new).is_empty());
    }

    #[test]
    fn test_integer_and_float_serialize_differently() {
        assert!(!same_serialized(&json!(1), &json!(1.0)));
        assert!(same_serialized(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
    }
}

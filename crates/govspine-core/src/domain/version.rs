//! Entity version snapshots
//!
//! A version is an opaque JSON snapshot of an entity taken at a significant
//! state change. For one `(entity_type, entity_id)` key, version numbers
//! start at 1 and increase by one per snapshot; old versions are removed by
//! the retention policy, never edited.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::audit::Actor;
use super::changes::{same_serialized, FieldChange};
use super::newtypes::UserId;

/// A version about to be written; the store assigns the number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVersion {
    pub entity_type: String,
    pub entity_id: String,
    pub snapshot: Value,
    pub change_reason: Option<String>,
    pub created_by_id: UserId,
}

/// A stored version with its snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVersion {
    pub entity_type: String,
    pub entity_id: String,
    pub version_number: u32,
    pub snapshot: Value,
    pub change_reason: Option<String>,
    pub created_by: Actor,
    pub created_at: DateTime<Utc>,
}

/// Version metadata without the snapshot, as listed in a history page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version_number: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: Actor,
    pub change_reason: Option<String>,
}

/// Key-level difference between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Keys present only in the newer snapshot
    pub added: Vec<String>,
    /// Keys present only in the older snapshot
    pub removed: Vec<String>,
    /// Keys present in both with a different serialized value
    pub changed: BTreeMap<String, FieldChange>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compares two snapshots key by key.
///
/// Non-object snapshots are treated as having no keys.
pub fn compare_snapshots(a: &Value, b: &Value) -> SnapshotDiff {
    let empty = serde_json::Map::new();
    let a = a.as_object().unwrap_or(&empty);
    let b = b.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let mut diff = SnapshotDiff::default();

    for key in keys {
        match (a.get(key), b.get(key)) {
            (None, Some(_)) => diff.added.push(key.clone()),
            (Some(_), None) => diff.removed.push(key.clone()),
            (Some(old), Some(new)) if !same_serialized(old, new) => {
                diff.changed
                    .insert(key.clone(), FieldChange::new(old.clone(), new.clone()));
            }
            _ => {}
        }
    }

    diff
}

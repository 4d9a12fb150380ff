//! Record cleaning before audit persistence
//!
//! Strips fields that must never reach the audit log (timestamps managed by
//! the database, credentials) and shrinks oversized values before a record
//! is turned into a change set.

use std::collections::HashSet;

use serde_json::{Map, Value};

use govspine_core::config::AuditConfig;

/// Suffix appended to strings cut at the configured length
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Arrays of byte-range integers at least this long are treated as binary
pub const MIN_BINARY_LEN: usize = 64;

/// Cleans entity records according to the audit configuration.
#[derive(Debug, Clone)]
pub struct RecordCleaner {
    excluded: HashSet<String>,
    max_string_length: usize,
}

impl RecordCleaner {
    /// Creates a new `RecordCleaner` from configuration.
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            excluded: config.excluded_fields.iter().cloned().collect(),
            max_string_length: config.max_string_length,
        }
    }

    /// Returns a cleaned copy of the top-level fields of `record`.
    ///
    /// Non-object values produce an empty map.
    pub fn clean(&self, record: &Value) -> Map<String, Value> {
        let Some(fields) = record.as_object() else {
            return Map::new();
        };

        fields
            .iter()
            .filter(|(key, _)| !self.excluded.contains(key.as_str()))
            .filter(|(_, value)| !value.is_null() && !is_binary(value))
            .map(|(key, value)| (key.clone(), self.shrink(value)))
            .collect()
    }

    fn shrink(&self, value: &Value) -> Value {
        match value {
            Value::String(s) if s.chars().count() > self.max_string_length => {
                let mut cut: String = s.chars().take(self.max_string_length).collect();
                cut.push_str(TRUNCATION_MARKER);
                Value::String(cut)
            }
            other => other.clone(),
        }
    }
}

impl Default for RecordCleaner {
    fn default() -> Self {
        Self::new(&AuditConfig::default())
    }
}

/// Serialized byte buffers show up as long arrays of 0..=255 integers.
fn is_binary(value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            items.len() >= MIN_BINARY_LEN
                && items
                    .iter()
                    .all(|v| v.as_u64().is_some_and(|n| n <= u64::from(u8::MAX)))
        }
        _ => false,
    }
}

//! Audit entry domain entities
//!
//! This module defines the append-only audit records written for every
//! governed mutation: who changed which entity, how, when, from which
//! request, and (where known) which fields changed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::changes::Changes;
use super::errors::DomainError;
use super::newtypes::{AuditId, RequestId, UserId};
use super::request::RequestSource;

/// Entity id used by summary entries that stand in for a bulk operation
pub const BATCH_ENTITY_ID: &str = "BATCH";

/// Actions that can be recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Entity was created
    Create,
    /// Entity was updated
    Update,
    /// Entity was deleted (soft or hard)
    Delete,
    /// Soft-deleted entity was restored
    Restore,
    /// Entity was approved in a review workflow
    Approve,
    /// Entity was rejected in a review workflow
    Reject,
    /// Entity was synchronized from an external system
    Sync,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Restore => "RESTORE",
            AuditAction::Approve => "APPROVE",
            AuditAction::Reject => "REJECT",
            AuditAction::Sync => "SYNC",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            "RESTORE" => Ok(AuditAction::Restore),
            "APPROVE" => Ok(AuditAction::Approve),
            "REJECT" => Ok(AuditAction::Reject),
            "SYNC" => Ok(AuditAction::Sync),
            other => Err(DomainError::UnknownAction(other.to_string())),
        }
    }
}

/// A user as shown next to audit, version and tombstone records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    /// Display name, when the actor is registered in the store
    pub name: Option<String>,
}

impl Actor {
    pub fn new(id: UserId, name: Option<String>) -> Self {
        Self { id, name }
    }
}

/// An audit log entry recording a single governed operation
///
/// Entries are append-only: the spine creates them through the audit
/// service and never updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this audit entry (assigned by database)
    id: Option<AuditId>,
    entity_type: String,
    /// Entity id, or [`BATCH_ENTITY_ID`] for bulk summaries
    entity_id: String,
    action: AuditAction,
    /// Field-level changes, when the caller could compute them
    changes: Option<Changes>,
    performed_by_id: UserId,
    request_id: RequestId,
    /// Origin of the request that performed the action
    source_module: RequestSource,
    reason: Option<String>,
    metadata: Option<Value>,
    performed_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates a new audit entry with the required fields
    ///
    /// The `id` field is `None` until the entry is persisted. Request id and
    /// source default to a fresh id and `SYSTEM`; use [`with_request`] to
    /// attribute the entry to a call chain.
    ///
    /// # Example
    ///
    /// ```
    /// use govspine_core::domain::{AuditAction, AuditEntry, UserId};
    ///
    /// let entry = AuditEntry::new("Building", "b1", AuditAction::Delete, UserId::new());
    /// assert!(entry.id().is_none());
    /// assert!(!entry.is_batch());
    /// ```
    ///
    /// [`with_request`]: AuditEntry::with_request
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: AuditAction,
        performed_by_id: UserId,
    ) -> Self {
        Self {
            id: None,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action,
            changes: None,
            performed_by_id,
            request_id: RequestId::new(),
            source_module: RequestSource::System,
            reason: None,
            metadata: None,
            performed_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Option<AuditId> {
        self.id
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn changes(&self) -> Option<&Changes> {
        self.changes.as_ref()
    }

    pub fn performed_by_id(&self) -> UserId {
        self.performed_by_id
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn source_module(&self) -> RequestSource {
        self.source_module
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn performed_at(&self) -> DateTime<Utc> {
        self.performed_at
    }

    /// Returns true for bulk summary entries
    pub fn is_batch(&self) -> bool {
        self.entity_id == BATCH_ENTITY_ID
    }

    /// Sets the ID for this audit entry (typically called after database insert)
    pub fn with_id(mut self, id: AuditId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attributes the entry to a request
    pub fn with_request(mut self, request_id: RequestId, source: RequestSource) -> Self {
        self.request_id = request_id;
        self.source_module = source;
        self
    }

    pub fn with_changes(mut self, changes: Changes) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Overrides the timestamp (used when reconstructing stored rows)
    pub fn with_performed_at(mut self, performed_at: DateTime<Utc>) -> Self {
        self.performed_at = performed_at;
        self
    }
}

/// An audit entry as read back, joined with the acting user's display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub entry: AuditEntry,
    pub performed_by: Actor,
}

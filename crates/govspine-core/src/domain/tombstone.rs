//! Soft-delete tombstones
//!
//! A tombstone is the `deleted_at` / `deleted_by_id` / `delete_reason`
//! triple stored on a soft-deletable entity's own row. The three fields are
//! always set together and cleared together.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::Actor;
use super::errors::DomainError;
use super::newtypes::UserId;
use super::page::PageRequest;

/// Entity types whose rows carry tombstone columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoftDeleteEntity {
    Project,
    Building,
    AssemblyPart,
}

impl SoftDeleteEntity {
    /// Every soft-deletable type
    pub const ALL: [SoftDeleteEntity; 3] = [
        SoftDeleteEntity::Project,
        SoftDeleteEntity::Building,
        SoftDeleteEntity::AssemblyPart,
    ];

    /// Entity type name as used in audit entries
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftDeleteEntity::Project => "Project",
            SoftDeleteEntity::Building => "Building",
            SoftDeleteEntity::AssemblyPart => "AssemblyPart",
        }
    }

    /// Table holding this entity's rows
    pub fn table_name(&self) -> &'static str {
        match self {
            SoftDeleteEntity::Project => "projects",
            SoftDeleteEntity::Building => "buildings",
            SoftDeleteEntity::AssemblyPart => "assembly_parts",
        }
    }
}

impl fmt::Display for SoftDeleteEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoftDeleteEntity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoftDeleteEntity::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| DomainError::SoftDeleteUnsupported(s.to_string()))
    }
}

/// The three tombstone fields, set as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub deleted_at: DateTime<Utc>,
    pub deleted_by_id: UserId,
    pub delete_reason: String,
}

impl Tombstone {
    /// Creates a tombstone stamped with the current time
    pub fn now(deleted_by_id: UserId, delete_reason: impl Into<String>) -> Self {
        Self {
            deleted_at: Utc::now(),
            deleted_by_id,
            delete_reason: delete_reason.into(),
        }
    }
}

/// Outcome of a conditional tombstone write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TombstoneWrite {
    /// The row changed state
    Applied,
    /// The row was already in the requested state; nothing was written
    Unchanged,
    /// No row with that id exists
    NotFound,
}

/// A tombstoned row as listed for recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: String,
    pub name: String,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: Option<Actor>,
    pub delete_reason: Option<String>,
}

/// Filter for listing tombstoned rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedFilter {
    /// Only rows deleted at or after this instant
    pub deleted_after: Option<DateTime<Utc>>,
    /// Only rows deleted at or before this instant
    pub deleted_before: Option<DateTime<Utc>>,
    pub page: PageRequest,
}

impl DeletedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deleted_after(mut self, after: DateTime<Utc>) -> Self {
        self.deleted_after = Some(after);
        self
    }

    pub fn with_deleted_before(mut self, before: DateTime<Utc>) -> Self {
        self.deleted_before = Some(before);
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

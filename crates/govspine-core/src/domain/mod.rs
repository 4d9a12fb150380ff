//! Domain entities
//!
//! This module contains the value types the governance spine records:
//! - Newtypes for user, request and audit identifiers
//! - The request context and its source
//! - Audit entries and field-level change sets
//! - Entity version snapshots
//! - Soft-delete tombstones
//! - System (failure) events
//! - Pagination shared by the read APIs

pub mod audit;
pub mod changes;
pub mod errors;
pub mod newtypes;
pub mod page;
pub mod request;
pub mod system_event;
pub mod tombstone;
pub mod version;

// Re-export commonly used types
pub use audit::{Actor, AuditAction, AuditEntry, AuditRecord, BATCH_ENTITY_ID};
pub use changes::{Changes, FieldChange};
pub use errors::DomainError;
pub use newtypes::*;
pub use page::{Page, PageRequest};
pub use request::{RequestContext, RequestSource, Session};
pub use system_event::{Severity, SystemEvent};
pub use tombstone::{DeletedFilter, DeletedItem, SoftDeleteEntity, Tombstone, TombstoneWrite};
pub use version::{EntityVersion, NewVersion, SnapshotDiff, VersionSummary};

//! Govspine SoftDelete - recoverable deletes
//!
//! Replaces destructive deletes of the soft-deletable entity types with a
//! tombstone (`deleted_at`, `deleted_by_id`, `delete_reason`) on the row
//! itself. Deletes and restores are conditional writes, so repeating one is
//! a no-op that writes neither the row nor the audit log.
//!
//! ## Key Components
//!
//! - [`SoftDeleteService`] - Delete, restore, bulk delete and recovery listings
//! - [`SoftDeleteError`] - Failure reasons reported in results

pub mod error;
pub mod service;

pub use error::SoftDeleteError;
pub use service::{BulkDeleteResult, DeleteParams, RestoreParams, SoftDeleteResult, SoftDeleteService};

//! Port definitions (hexagonal architecture interfaces)
//!
//! The services in the other governance crates depend only on these traits;
//! the SQLite adapter in `govspine-store` implements all of them.
//!
//! ## Ports Overview
//!
//! - [`IAuditStore`] - Append-only audit entries and their read views
//! - [`IVersionStore`] - Version snapshots, numbering and retention pruning
//! - [`ITombstoneStore`] - Soft-delete tombstones on entity rows
//! - [`ISystemEventStore`] - Failure records
//! - [`ITransactionStore`] - Begin/commit/rollback of store transactions

pub mod audit_store;
pub mod event_store;
pub mod tombstone_store;
pub mod transaction_store;
pub mod version_store;

pub use audit_store::{IAuditStore, RecentFilter};
pub use event_store::ISystemEventStore;
pub use tombstone_store::ITombstoneStore;
pub use transaction_store::ITransactionStore;
pub use version_store::IVersionStore;

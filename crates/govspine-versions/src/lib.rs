//! Govspine Versions - entity version snapshots
//!
//! Stores opaque JSON snapshots of governed entities under contiguous,
//! per-entity version numbers and prunes old versions according to a
//! per-entity-type retention policy.
//!
//! ## Key Components
//!
//! - [`VersionService`] - Snapshot creation, point-in-time reads, history and comparison
//! - [`RetentionPolicy`] - How many versions of an entity type are kept

pub mod retention;
pub mod service;

pub use retention::RetentionPolicy;
pub use service::{CreateVersionParams, VersionService};

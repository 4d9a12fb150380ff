//! Version store port
//!
//! Storage for entity version snapshots keyed by
//! `(entity_type, entity_id, version_number)`.

use chrono::{DateTime, Utc};

use crate::domain::{EntityVersion, NewVersion, Page, PageRequest, VersionSummary};

/// Port trait for version snapshot storage
///
/// ## Implementation Notes
///
/// - `insert_next_version` must allocate `max + 1` and insert in one atomic
///   step. When a concurrent writer claimed the same number first, it returns
///   `Ok(None)` so the caller can retry; other failures are errors.
/// - Pruning deletes rows; stored versions are never modified.
#[async_trait::async_trait]
pub trait IVersionStore: Send + Sync {
    /// Inserts the next version for the key and returns its number
    async fn insert_next_version(&self, version: &NewVersion) -> anyhow::Result<Option<u32>>;

    /// Exact version lookup
    async fn get_version(
        &self,
        entity_type: &str,
        entity_id: &str,
        version_number: u32,
    ) -> anyhow::Result<Option<EntityVersion>>;

    /// Newest version created at or before `at`
    async fn get_version_at(
        &self,
        entity_type: &str,
        entity_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<EntityVersion>>;

    /// Version metadata, newest first, plus the total number of versions
    async fn get_version_history(
        &self,
        entity_type: &str,
        entity_id: &str,
        page: PageRequest,
    ) -> anyhow::Result<Page<VersionSummary>>;

    /// Highest version number for the key, 0 when there is none
    async fn latest_version_number(&self, entity_type: &str, entity_id: &str)
        -> anyhow::Result<u32>;

    /// Deletes all but the `keep` highest-numbered versions; returns rows removed
    async fn prune_versions(
        &self,
        entity_type: &str,
        entity_id: &str,
        keep: u32,
    ) -> anyhow::Result<u64>;
}

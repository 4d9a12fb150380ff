//! Tombstone store port
//!
//! Conditional writes of the soft-delete triple on entity rows. Every write
//! is guarded by the current tombstone state so that concurrent deletes and
//! restores never double-apply.

use crate::domain::{DeletedFilter, DeletedItem, Page, SoftDeleteEntity, Tombstone, TombstoneWrite};

/// Port trait for tombstone storage
#[async_trait::async_trait]
pub trait ITombstoneStore: Send + Sync {
    /// Sets the tombstone on a live row.
    ///
    /// Returns [`TombstoneWrite::Unchanged`] when the row is already deleted
    /// and [`TombstoneWrite::NotFound`] when it does not exist.
    async fn mark_deleted(
        &self,
        entity: SoftDeleteEntity,
        id: &str,
        tombstone: &Tombstone,
    ) -> anyhow::Result<TombstoneWrite>;

    /// Clears the tombstone on a deleted row.
    ///
    /// Returns [`TombstoneWrite::Unchanged`] when the row is live.
    async fn clear_tombstone(&self, entity: SoftDeleteEntity, id: &str)
        -> anyhow::Result<TombstoneWrite>;

    /// Tombstones every live row among `ids` in one statement; returns rows written
    async fn mark_deleted_bulk(
        &self,
        entity: SoftDeleteEntity,
        ids: &[String],
        tombstone: &Tombstone,
    ) -> anyhow::Result<u64>;

    /// Tombstoned rows, newest deletion first, plus the total matching
    async fn list_deleted(
        &self,
        entity: SoftDeleteEntity,
        filter: &DeletedFilter,
    ) -> anyhow::Result<Page<DeletedItem>>;

    /// True when the row exists and carries a tombstone
    async fn is_deleted(&self, entity: SoftDeleteEntity, id: &str) -> anyhow::Result<bool>;
}

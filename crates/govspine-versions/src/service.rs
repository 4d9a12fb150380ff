//! VersionService - entity snapshot versioning
//!
//! Writes are best-effort like audit writes: a failed snapshot is logged and
//! reported as `None`, never as an error. Reads that fail are logged and
//! return an empty result.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use govspine_core::config::VersionsConfig;
use govspine_core::context;
use govspine_core::domain::{
    version::compare_snapshots, EntityVersion, NewVersion, Page, PageRequest, SnapshotDiff, UserId,
    VersionSummary,
};
use govspine_core::ports::IVersionStore;

use crate::retention::RetentionPolicy;

/// Parameters for [`VersionService::create_version`]
#[derive(Debug, Clone, PartialEq)]
pub struct CreateVersionParams {
    pub entity_type: String,
    pub entity_id: String,
    pub snapshot: Value,
    pub change_reason: Option<String>,
    /// Overrides the acting user from the ambient context
    pub user_id: Option<UserId>,
}

impl CreateVersionParams {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>, snapshot: Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            snapshot,
            change_reason: None,
            user_id: None,
        }
    }

    pub fn with_change_reason(mut self, reason: impl Into<String>) -> Self {
        self.change_reason = Some(reason.into());
        self
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Snapshot versioning over the version store
pub struct VersionService {
    store: Arc<dyn IVersionStore>,
    config: VersionsConfig,
    versioned: HashSet<String>,
}

impl VersionService {
    pub fn new(store: Arc<dyn IVersionStore>) -> Self {
        Self::with_config(store, VersionsConfig::default())
    }

    pub fn with_config(store: Arc<dyn IVersionStore>, config: VersionsConfig) -> Self {
        let versioned = config.versioned_entities.iter().cloned().collect();
        Self {
            store,
            config,
            versioned,
        }
    }

    /// Whether snapshots are kept for `entity_type`
    pub fn is_versioned(&self, entity_type: &str) -> bool {
        self.versioned.contains(entity_type)
    }

    /// Retention policy applied to `entity_type`
    pub fn retention_for(&self, entity_type: &str) -> RetentionPolicy {
        RetentionPolicy::for_entity(&self.config, entity_type)
    }

    /// Stores the next version of an entity and applies retention.
    ///
    /// Returns the new version number, or `None` when no acting user
    /// resolves or the write failed.
    pub async fn create_version(&self, params: CreateVersionParams) -> Option<u32> {
        let Some(user_id) = params.user_id.or_else(context::current_user_id) else {
            tracing::warn!(
                entity_type = %params.entity_type,
                entity_id = %params.entity_id,
                "No user available for version snapshot, skipping"
            );
            return None;
        };

        let version = NewVersion {
            entity_type: params.entity_type,
            entity_id: params.entity_id,
            snapshot: params.snapshot,
            change_reason: params.change_reason,
            created_by_id: user_id,
        };

        let number = self.allocate(&version).await?;

        tracing::debug!(
            entity_type = %version.entity_type,
            entity_id = %version.entity_id,
            version = number,
            "Created version"
        );

        self.apply_retention(&version.entity_type, &version.entity_id)
            .await;

        Some(number)
    }

    /// Inserts `version`, retrying when another writer claimed the number.
    async fn allocate(&self, version: &NewVersion) -> Option<u32> {
        let attempts = self.config.allocation_retries.max(1);

        for attempt in 1..=attempts {
            match self.store.insert_next_version(version).await {
                Ok(Some(number)) => return Some(number),
                Ok(None) => {
                    tracing::debug!(
                        entity_type = %version.entity_type,
                        entity_id = %version.entity_id,
                        attempt,
                        "Version number taken by a concurrent writer, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        entity_type = %version.entity_type,
                        entity_id = %version.entity_id,
                        "Failed to create version"
                    );
                    return None;
                }
            }
        }

        tracing::error!(
            entity_type = %version.entity_type,
            entity_id = %version.entity_id,
            attempts,
            "Gave up allocating a version number"
        );
        None
    }

    async fn apply_retention(&self, entity_type: &str, entity_id: &str) {
        let RetentionPolicy::KeepLatest(keep) = self.retention_for(entity_type) else {
            return;
        };

        match self.store.prune_versions(entity_type, entity_id, keep).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(
                entity_type = %entity_type,
                entity_id = %entity_id,
                removed,
                keep,
                "Pruned old versions"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                entity_type = %entity_type,
                entity_id = %entity_id,
                "Failed to apply version retention"
            ),
        }
    }

    /// The version current as of `at`
    pub async fn get_version_at(
        &self,
        entity_type: &str,
        entity_id: &str,
        at: DateTime<Utc>,
    ) -> Option<EntityVersion> {
        self.store
            .get_version_at(entity_type, entity_id, at)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, entity_type = %entity_type, entity_id = %entity_id, "Failed to read version at time");
                None
            })
    }

    pub async fn get_version(
        &self,
        entity_type: &str,
        entity_id: &str,
        version_number: u32,
    ) -> Option<EntityVersion> {
        self.store
            .get_version(entity_type, entity_id, version_number)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, entity_type = %entity_type, entity_id = %entity_id, version_number, "Failed to read version");
                None
            })
    }

    /// Version metadata, newest first
    pub async fn get_history(
        &self,
        entity_type: &str,
        entity_id: &str,
        page: PageRequest,
    ) -> Page<VersionSummary> {
        self.store
            .get_version_history(entity_type, entity_id, page)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, entity_type = %entity_type, entity_id = %entity_id, "Failed to read version history");
                Page::default()
            })
    }

    /// Highest version number, 0 when there is none
    pub async fn get_latest_version_number(&self, entity_type: &str, entity_id: &str) -> u32 {
        self.store
            .latest_version_number(entity_type, entity_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, entity_type = %entity_type, entity_id = %entity_id, "Failed to read latest version number");
                0
            })
    }

    /// Key-level diff from version `a` to version `b`.
    ///
    /// `None` if either version does not exist.
    pub async fn compare_versions(
        &self,
        entity_type: &str,
        entity_id: &str,
        a: u32,
        b: u32,
    ) -> Option<SnapshotDiff> {
        let older = self.get_version(entity_type, entity_id, a).await?;
        let newer = self.get_version(entity_type, entity_id, b).await?;
        Some(compare_snapshots(&older.snapshot, &newer.snapshot))
    }
}

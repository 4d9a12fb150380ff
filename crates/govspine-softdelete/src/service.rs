//! SoftDeleteService - tombstone deletes with audit
//!
//! Every operation reports its outcome as a typed result; nothing here
//! returns `Err`. Audit entries are written only when a row actually
//! changed state.

use std::sync::Arc;

use serde::Serialize;

use govspine_audit::{AuditService, BatchLogParams, LogParams};
use govspine_core::context;
use govspine_core::domain::{
    AuditAction, DeletedFilter, DeletedItem, Page, SoftDeleteEntity, Tombstone, TombstoneWrite,
    UserId,
};
use govspine_core::ports::ITombstoneStore;

use crate::error::SoftDeleteError;

/// Outcome of a single delete or restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftDeleteResult {
    pub success: bool,
    pub error: Option<String>,
}

impl SoftDeleteResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: &SoftDeleteError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Outcome of a bulk delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkDeleteResult {
    pub success: bool,
    /// Rows tombstoned by this call
    pub deleted: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteParams {
    pub entity: SoftDeleteEntity,
    pub entity_id: String,
    pub reason: String,
    /// Overrides the acting user from the ambient context
    pub user_id: Option<UserId>,
}

impl DeleteParams {
    pub fn new(entity: SoftDeleteEntity, entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity,
            entity_id: entity_id.into(),
            reason: reason.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreParams {
    pub entity: SoftDeleteEntity,
    pub entity_id: String,
    /// Overrides the acting user from the ambient context
    pub user_id: Option<UserId>,
}

impl RestoreParams {
    pub fn new(entity: SoftDeleteEntity, entity_id: impl Into<String>) -> Self {
        Self {
            entity,
            entity_id: entity_id.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

pub struct SoftDeleteService {
    store: Arc<dyn ITombstoneStore>,
    audit: Arc<AuditService>,
}

impl SoftDeleteService {
    pub fn new(store: Arc<dyn ITombstoneStore>, audit: Arc<AuditService>) -> Self {
        Self { store, audit }
    }

    /// Tombstones a live row and audits the delete.
    ///
    /// Deleting an already-deleted row succeeds without writing anything.
    pub async fn delete(&self, params: DeleteParams) -> SoftDeleteResult {
        match self.try_delete(params).await {
            Ok(()) => SoftDeleteResult::ok(),
            Err(e) => SoftDeleteResult::failed(&e),
        }
    }

    async fn try_delete(&self, params: DeleteParams) -> Result<(), SoftDeleteError> {
        let user_id = params
            .user_id
            .or_else(context::current_user_id)
            .ok_or(SoftDeleteError::DeleteUserRequired)?;

        let tombstone = Tombstone::now(user_id, params.reason.clone());
        let write = self
            .store
            .mark_deleted(params.entity, &params.entity_id, &tombstone)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, entity = %params.entity, entity_id = %params.entity_id, "Failed to soft delete");
                SoftDeleteError::from(e)
            })?;

        match write {
            TombstoneWrite::Applied => {
                tracing::info!(entity = %params.entity, entity_id = %params.entity_id, "Soft deleted");
                self.audit
                    .log(
                        LogParams::new(params.entity.as_str(), &params.entity_id, AuditAction::Delete)
                            .with_reason(params.reason)
                            .with_user_id(user_id),
                    )
                    .await;
                Ok(())
            }
            TombstoneWrite::Unchanged => {
                tracing::debug!(entity = %params.entity, entity_id = %params.entity_id, "Already deleted");
                Ok(())
            }
            TombstoneWrite::NotFound => Err(SoftDeleteError::NotFound {
                entity: params.entity,
                id: params.entity_id,
            }),
        }
    }

    /// Clears the tombstone of a deleted row and audits the restore.
    ///
    /// Restoring a live row succeeds without writing anything.
    pub async fn restore(&self, params: RestoreParams) -> SoftDeleteResult {
        match self.try_restore(params).await {
            Ok(()) => SoftDeleteResult::ok(),
            Err(e) => SoftDeleteResult::failed(&e),
        }
    }

    async fn try_restore(&self, params: RestoreParams) -> Result<(), SoftDeleteError> {
        let user_id = params
            .user_id
            .or_else(context::current_user_id)
            .ok_or(SoftDeleteError::RestoreUserRequired)?;

        let write = self
            .store
            .clear_tombstone(params.entity, &params.entity_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, entity = %params.entity, entity_id = %params.entity_id, "Failed to restore");
                SoftDeleteError::from(e)
            })?;

        match write {
            TombstoneWrite::Applied => {
                tracing::info!(entity = %params.entity, entity_id = %params.entity_id, "Restored");
                self.audit
                    .log(
                        LogParams::new(params.entity.as_str(), &params.entity_id, AuditAction::Restore)
                            .with_user_id(user_id),
                    )
                    .await;
                Ok(())
            }
            TombstoneWrite::Unchanged => Ok(()),
            TombstoneWrite::NotFound => Err(SoftDeleteError::NotFound {
                entity: params.entity,
                id: params.entity_id,
            }),
        }
    }

    /// Tombstones every live row among `ids` and writes one batch summary.
    pub async fn delete_bulk(
        &self,
        entity: SoftDeleteEntity,
        ids: &[String],
        reason: &str,
        user_id: Option<UserId>,
    ) -> BulkDeleteResult {
        let Some(user_id) = user_id.or_else(context::current_user_id) else {
            return BulkDeleteResult {
                success: false,
                deleted: 0,
                errors: vec![SoftDeleteError::DeleteUserRequired.to_string()],
            };
        };

        if ids.is_empty() {
            return BulkDeleteResult {
                success: true,
                deleted: 0,
                errors: Vec::new(),
            };
        }

        let tombstone = Tombstone::now(user_id, reason);
        match self.store.mark_deleted_bulk(entity, ids, &tombstone).await {
            Ok(deleted) => {
                tracing::info!(entity = %entity, requested = ids.len(), deleted, "Bulk soft delete");
                self.audit
                    .log_batch(
                        BatchLogParams::new(
                            entity.as_str(),
                            AuditAction::Delete,
                            ids.to_vec(),
                            format!("Bulk soft delete: {reason}"),
                        )
                        .with_user_id(user_id),
                    )
                    .await;
                BulkDeleteResult {
                    success: true,
                    deleted,
                    errors: Vec::new(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, entity = %entity, "Failed bulk soft delete");
                BulkDeleteResult {
                    success: false,
                    deleted: 0,
                    errors: vec![e.to_string()],
                }
            }
        }
    }

    /// Tombstoned rows, newest deletion first
    pub async fn get_deleted(&self, entity: SoftDeleteEntity, filter: &DeletedFilter) -> Page<DeletedItem> {
        self.store
            .list_deleted(entity, filter)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, entity = %entity, "Failed to list deleted rows");
                Page::default()
            })
    }

    pub async fn is_deleted(&self, entity: SoftDeleteEntity, id: &str) -> bool {
        self.store.is_deleted(entity, id).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, entity = %entity, entity_id = %id, "Failed to read tombstone");
            false
        })
    }

    /// Whether `entity_type` names a soft-deletable type
    pub fn supports_soft_delete(entity_type: &str) -> bool {
        entity_type.parse::<SoftDeleteEntity>().is_ok()
    }
}

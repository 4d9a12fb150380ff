//! Mutation interception hooks
//!
//! Repository methods wrap each write in [`AuditMiddleware::around_record`]
//! or [`AuditMiddleware::around_bulk`]. The wrapped future always runs first
//! and its result is returned unchanged; audit work is only queued after a
//! successful mutation of an audited entity type, and only when the ambient
//! context carries a user.
//!
//! ```text
//! repository ──► around_record ──► mutation ──► result (returned as is)
//!                      │
//!                      └──► BatchTracker ──► AuditDispatcher ──► AuditService
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use govspine_core::config::AuditConfig;
use govspine_core::context;
use govspine_core::domain::AuditAction;
use govspine_core::ports::IAuditStore;

use crate::batch::BatchTracker;
use crate::cleaner::RecordCleaner;
use crate::dispatcher::{AuditDispatcher, AuditJob};
use crate::service::{AuditService, BatchLogParams};

/// Single-record mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOp {
    Create,
    Update,
    Delete,
}

/// Bulk mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
    CreateMany,
    UpdateMany,
    DeleteMany,
}

impl BulkOp {
    pub fn action(&self) -> AuditAction {
        match self {
            BulkOp::CreateMany => AuditAction::Create,
            BulkOp::UpdateMany => AuditAction::Update,
            BulkOp::DeleteMany => AuditAction::Delete,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            BulkOp::CreateMany => "created",
            BulkOp::UpdateMany => "updated",
            BulkOp::DeleteMany => "deleted",
        }
    }
}

/// Decides which mutations are audited and queues the work
pub struct AuditMiddleware {
    audited: HashSet<String>,
    tracker: BatchTracker,
    dispatcher: Arc<AuditDispatcher>,
}

impl AuditMiddleware {
    pub fn new(config: &AuditConfig, dispatcher: Arc<AuditDispatcher>) -> Self {
        Self {
            audited: config.audited_entities.iter().cloned().collect(),
            tracker: BatchTracker::from_config(config),
            dispatcher,
        }
    }

    /// Builds the service, cleaner and dispatcher over `store`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn IAuditStore>, config: &AuditConfig) -> Self {
        let service = Arc::new(AuditService::with_config(store, config));
        let dispatcher = AuditDispatcher::spawn(
            service,
            RecordCleaner::new(config),
            config.queue_capacity,
        );
        Self::new(config, Arc::new(dispatcher))
    }

    pub fn dispatcher(&self) -> &Arc<AuditDispatcher> {
        &self.dispatcher
    }

    pub fn is_audited(&self, entity_type: &str) -> bool {
        self.audited.contains(entity_type)
    }

    /// Runs a single-record mutation and queues its audit entry.
    ///
    /// The record's id is read from its serialized `id` field.
    pub async fn around_record<T, E, F>(
        &self,
        entity_type: &str,
        op: RecordOp,
        mutation: F,
    ) -> Result<T, E>
    where
        T: Serialize,
        F: Future<Output = Result<T, E>>,
    {
        let result = mutation.await;

        if let Ok(record) = &result {
            if self.is_audited(entity_type) {
                self.after_record(entity_type, op, record);
            }
        }

        result
    }

    /// Runs a bulk mutation returning the affected row count and queues one
    /// summary entry for it.
    pub async fn around_bulk<E, F>(&self, entity_type: &str, op: BulkOp, mutation: F) -> Result<u64, E>
    where
        F: Future<Output = Result<u64, E>>,
    {
        let result = mutation.await;

        if let Ok(count) = &result {
            if self.is_audited(entity_type) && context::current_user_id().is_some() {
                let params = BatchLogParams::new(
                    entity_type,
                    op.action(),
                    Vec::new(),
                    format!("Bulk {} {count} {entity_type} records", op.verb()),
                )
                .with_metadata(json!({ "affected": count }));
                self.dispatcher.enqueue(AuditJob::Batch(params));
            }
        }

        result
    }

    fn after_record<T: Serialize>(&self, entity_type: &str, op: RecordOp, record: &T) {
        if context::current_user_id().is_none() {
            return;
        }

        if !self.tracker.record(context::request_id(), entity_type) {
            return;
        }

        let value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, entity_type = %entity_type, "Failed to serialize record for audit");
                return;
            }
        };

        let Some(entity_id) = record_id(&value) else {
            tracing::warn!(entity_type = %entity_type, ?op, "Mutated record has no id, audit skipped");
            return;
        };

        let entity_type = entity_type.to_string();
        let job = match op {
            RecordOp::Create => AuditJob::Create {
                entity_type,
                entity_id,
                record: value,
            },
            RecordOp::Update => AuditJob::Update {
                entity_type,
                entity_id,
            },
            RecordOp::Delete => AuditJob::Delete {
                entity_type,
                entity_id,
            },
        };

        self.dispatcher.enqueue(job);
    }
}

/// String or numeric `id` field of a serialized record
fn record_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

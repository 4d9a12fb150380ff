//! AuditService - high-level audit logging service
//!
//! Wraps the [`IAuditStore`] port with convenience methods for each kind of
//! governed operation. All write methods are non-fatal: errors in audit
//! persistence are logged via `tracing::warn!` but never propagated. Reads
//! that fail are logged and return an empty result.
//!
//! Request id and source are taken from the ambient request context; the
//! acting user comes from an explicit override or from that context.

use std::sync::Arc;

use serde_json::{Map, Value};

use govspine_core::config::AuditConfig;
use govspine_core::context;
use govspine_core::domain::{
    changes::{creation_changes, diff_fields},
    AuditAction, AuditEntry, AuditRecord, Changes, Page, PageRequest, UserId, BATCH_ENTITY_ID,
};
use govspine_core::ports::{IAuditStore, RecentFilter};

/// Parameters for a single audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct LogParams {
    pub entity_type: String,
    pub entity_id: String,
    pub action: AuditAction,
    pub changes: Option<Changes>,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
    /// Overrides the acting user from the ambient context
    pub user_id: Option<UserId>,
}

impl LogParams {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: AuditAction,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action,
            changes: None,
            reason: None,
            metadata: None,
            user_id: None,
        }
    }

    pub fn with_changes(mut self, changes: Changes) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Parameters for a batch summary entry
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLogParams {
    pub entity_type: String,
    pub action: AuditAction,
    pub entity_ids: Vec<String>,
    /// Stored as the entry's reason
    pub summary: String,
    pub metadata: Option<Value>,
    /// Overrides the acting user from the ambient context
    pub user_id: Option<UserId>,
}

impl BatchLogParams {
    pub fn new(
        entity_type: impl Into<String>,
        action: AuditAction,
        entity_ids: Vec<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            action,
            entity_ids,
            summary: summary.into(),
            metadata: None,
            user_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// High-level audit service over the audit store.
///
/// All methods silently swallow errors (logging a warning) to ensure
/// audit failures never break the operation being audited.
pub struct AuditService {
    store: Arc<dyn IAuditStore>,
    batch_id_sample_size: usize,
}

impl AuditService {
    /// Creates a new `AuditService` backed by the given store.
    pub fn new(store: Arc<dyn IAuditStore>) -> Self {
        Self::with_config(store, &AuditConfig::default())
    }

    /// Creates a service using the limits from `config`.
    pub fn with_config(store: Arc<dyn IAuditStore>, config: &AuditConfig) -> Self {
        Self {
            store,
            batch_id_sample_size: config.batch_id_sample_size,
        }
    }

    /// Persist an audit entry, swallowing errors with a tracing warning.
    async fn save(&self, entry: &AuditEntry) {
        if let Err(e) = self.store.insert_audit(entry).await {
            tracing::warn!(
                error = %e,
                entity_type = %entry.entity_type(),
                entity_id = %entry.entity_id(),
                action = %entry.action(),
                "Failed to save audit entry"
            );
        }
    }

    /// Starts an entry attributed to the ambient request
    fn entry(
        entity_type: &str,
        entity_id: &str,
        action: AuditAction,
        performed_by: UserId,
    ) -> AuditEntry {
        AuditEntry::new(entity_type, entity_id, action, performed_by)
            .with_request(context::request_id(), context::request_source())
    }

    // ========================================================================
    // Generic entries
    // ========================================================================

    /// Log a single audit entry.
    ///
    /// Skipped with a warning when no acting user can be resolved.
    pub async fn log(&self, params: LogParams) {
        let Some(user_id) = params.user_id.or_else(context::current_user_id) else {
            tracing::warn!(
                entity_type = %params.entity_type,
                entity_id = %params.entity_id,
                action = %params.action,
                "No user available for audit entry, skipping"
            );
            return;
        };

        let mut entry = Self::entry(&params.entity_type, &params.entity_id, params.action, user_id);
        if let Some(changes) = params.changes {
            entry = entry.with_changes(changes);
        }
        if let Some(reason) = params.reason {
            entry = entry.with_reason(reason);
        }
        if let Some(metadata) = params.metadata {
            entry = entry.with_metadata(metadata);
        }

        self.save(&entry).await;
    }

    /// Log one summary entry standing in for a bulk operation.
    ///
    /// The stored metadata is the caller's metadata plus `batchSize` (the
    /// full id count) and `entityIds` (a bounded sample of the ids).
    pub async fn log_batch(&self, params: BatchLogParams) {
        let Some(user_id) = params.user_id.or_else(context::current_user_id) else {
            tracing::warn!(
                entity_type = %params.entity_type,
                action = %params.action,
                "No user available for batch audit entry, skipping"
            );
            return;
        };

        let mut metadata = match params.metadata {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = Map::new();
                map.insert("details".into(), other);
                map
            }
            None => Map::new(),
        };
        metadata.insert("batchSize".into(), Value::from(params.entity_ids.len()));
        metadata.insert(
            "entityIds".into(),
            Value::from(
                params
                    .entity_ids
                    .iter()
                    .take(self.batch_id_sample_size)
                    .cloned()
                    .collect::<Vec<_>>(),
            ),
        );

        let entry = Self::entry(&params.entity_type, BATCH_ENTITY_ID, params.action, user_id)
            .with_reason(params.summary)
            .with_metadata(Value::Object(metadata));

        self.save(&entry).await;
    }

    // ========================================================================
    // Entity lifecycle
    // ========================================================================

    /// Log entity creation; every field goes from `null` to its value.
    pub async fn log_create(
        &self,
        entity_type: &str,
        entity_id: &str,
        data: &Value,
        reason: Option<&str>,
    ) {
        let changes = match data.as_object() {
            Some(fields) => creation_changes(fields),
            None => Changes::new(),
        };

        let mut params =
            LogParams::new(entity_type, entity_id, AuditAction::Create).with_changes(changes);
        if let Some(reason) = reason {
            params = params.with_reason(reason);
        }
        self.log(params).await;
    }

    /// Log an update with field-level changes.
    ///
    /// Only keys of `new` whose value differs from `old` are recorded; when
    /// nothing changed no entry is written.
    pub async fn log_update(
        &self,
        entity_type: &str,
        entity_id: &str,
        old: &Value,
        new: &Value,
        reason: Option<&str>,
    ) {
        let empty = Map::new();
        let changes = diff_fields(
            old.as_object().unwrap_or(&empty),
            new.as_object().unwrap_or(&empty),
        );

        if changes.is_empty() {
            tracing::debug!(
                entity_type = %entity_type,
                entity_id = %entity_id,
                "No field changes, audit entry skipped"
            );
            return;
        }

        let mut params =
            LogParams::new(entity_type, entity_id, AuditAction::Update).with_changes(changes);
        if let Some(reason) = reason {
            params = params.with_reason(reason);
        }
        self.log(params).await;
    }

    /// Log entity deletion.
    pub async fn log_delete(&self, entity_type: &str, entity_id: &str, reason: Option<&str>) {
        let mut params = LogParams::new(entity_type, entity_id, AuditAction::Delete);
        if let Some(reason) = reason {
            params = params.with_reason(reason);
        }
        self.log(params).await;
    }

    /// Log restoration of a soft-deleted entity.
    pub async fn log_restore(&self, entity_type: &str, entity_id: &str, reason: Option<&str>) {
        let mut params = LogParams::new(entity_type, entity_id, AuditAction::Restore);
        if let Some(reason) = reason {
            params = params.with_reason(reason);
        }
        self.log(params).await;
    }

    // ========================================================================
    // Review workflow and sync
    // ========================================================================

    /// Log an approval.
    pub async fn log_approve(
        &self,
        entity_type: &str,
        entity_id: &str,
        reason: Option<&str>,
        metadata: Option<Value>,
    ) {
        let mut params = LogParams::new(entity_type, entity_id, AuditAction::Approve);
        if let Some(reason) = reason {
            params = params.with_reason(reason);
        }
        if let Some(metadata) = metadata {
            params = params.with_metadata(metadata);
        }
        self.log(params).await;
    }

    /// Log a rejection. A reason is mandatory.
    pub async fn log_reject(
        &self,
        entity_type: &str,
        entity_id: &str,
        reason: &str,
        metadata: Option<Value>,
    ) {
        let mut params =
            LogParams::new(entity_type, entity_id, AuditAction::Reject).with_reason(reason);
        if let Some(metadata) = metadata {
            params = params.with_metadata(metadata);
        }
        self.log(params).await;
    }

    /// Log a synchronization from an external system.
    pub async fn log_sync(
        &self,
        entity_type: &str,
        entity_id: &str,
        source: &str,
        metadata: Option<Value>,
    ) {
        let mut params = LogParams::new(entity_type, entity_id, AuditAction::Sync)
            .with_reason(format!("Synced from {source}"));
        if let Some(metadata) = metadata {
            params = params.with_metadata(metadata);
        }
        self.log(params).await;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Audit trail of one entity, newest first, with the total entry count.
    pub async fn get_trail(
        &self,
        entity_type: &str,
        entity_id: &str,
        page: PageRequest,
    ) -> Page<AuditRecord> {
        match self.store.get_audit_trail(entity_type, entity_id, page).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    entity_type = %entity_type,
                    entity_id = %entity_id,
                    "Failed to read audit trail"
                );
                Page::default()
            }
        }
    }

    /// Most recent entries across entities, newest first.
    pub async fn get_recent(&self, filter: &RecentFilter) -> Vec<AuditRecord> {
        match self.store.get_recent_audit(filter).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read recent audit entries");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use govspine_core::context::run_with_context;
    use govspine_core::domain::{Actor, AuditId, RequestContext, RequestSource};

    /// In-memory mock store that records inserted audit entries
    struct MockStore {
        entries: Mutex<Vec<AuditEntry>>,
        fail: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn entries(&self) -> Vec<AuditEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IAuditStore for MockStore {
        async fn insert_audit(&self, entry: &AuditEntry) -> anyhow::Result<AuditId> {
            if self.fail {
                anyhow::bail!("database is locked");
            }
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry.clone());
            Ok(AuditId::new(entries.len() as i64))
        }

        async fn get_audit_trail(
            &self,
            entity_type: &str,
            entity_id: &str,
            page: PageRequest,
        ) -> anyhow::Result<Page<AuditRecord>> {
            if self.fail {
                anyhow::bail!("database is locked");
            }
            let matching: Vec<_> = self
                .entries()
                .into_iter()
                .rev()
                .filter(|e| e.entity_type() == entity_type && e.entity_id() == entity_id)
                .collect();
            let total = matching.len() as u64;
            let items = matching
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .map(|entry| AuditRecord {
                    performed_by: Actor::new(entry.performed_by_id(), None),
                    entry,
                })
                .collect();
            Ok(Page::new(items, total))
        }

        async fn get_recent_audit(
            &self,
            _filter: &RecentFilter,
        ) -> anyhow::Result<Vec<AuditRecord>> {
            anyhow::bail!("not available")
        }
    }

    fn user_context() -> (UserId, RequestContext) {
        let user = UserId::new();
        (user, RequestContext::new(Some(user)).with_source(RequestSource::Ui))
    }

    #[tokio::test]
    async fn test_log_create_records_every_field() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let (user, ctx) = user_context();
        let request_id = ctx.request_id();

        run_with_context(ctx, async {
            service
                .log_create("Building", "b1", &json!({"name": "A", "designation": "X"}), None)
                .await;
        })
        .await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.action(), AuditAction::Create);
        assert_eq!(entry.performed_by_id(), user);
        assert_eq!(entry.request_id(), request_id);
        assert_eq!(entry.source_module(), RequestSource::Ui);

        let changes = entry.changes().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["name"].old, Value::Null);
        assert_eq!(changes["name"].new, json!("A"));
        assert_eq!(changes["designation"].new, json!("X"));
    }

    #[tokio::test]
    async fn test_log_update_records_only_changed_keys_of_new() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let (_, ctx) = user_context();

        run_with_context(ctx, async {
            service
                .log_update(
                    "Building",
                    "b1",
                    &json!({"name": "A", "designation": "X", "legacy": 1}),
                    &json!({"name": "B", "designation": "X", "floors": 4}),
                    Some("rename"),
                )
                .await;
        })
        .await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        let changes = entries[0].changes().unwrap();
        let keys: Vec<_> = changes.keys().cloned().collect();
        assert_eq!(keys, vec!["floors", "name"]);
        assert_eq!(changes["name"].old, json!("A"));
        assert_eq!(changes["name"].new, json!("B"));
        assert_eq!(changes["floors"].old, Value::Null);
        assert_eq!(entries[0].reason(), Some("rename"));
    }

    #[tokio::test]
    async fn test_log_update_records_key_added_as_null() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let (_, ctx) = user_context();

        run_with_context(ctx, async {
            service
                .log_update("Building", "b1", &json!({"name": "A"}), &json!({"name": "A", "note": null}), None)
                .await;
        })
        .await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        let changes = entries[0].changes().unwrap();
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["note"]);
        assert_eq!(changes["note"].old, Value::Null);
    }

    #[tokio::test]
    async fn test_log_update_without_changes_writes_nothing() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let (_, ctx) = user_context();

        run_with_context(ctx, async {
            let data = json!({"name": "A", "tags": ["x", "y"]});
            service.log_update("Building", "b1", &data, &data, None).await;
        })
        .await;

        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_log_without_user_is_skipped() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());

        service.log_delete("Task", "t1", None).await;
        run_with_context(RequestContext::system(RequestSource::Cron, None), async {
            service.log_delete("Task", "t1", None).await;
        })
        .await;

        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_user_overrides_context() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let override_user = UserId::new();

        service
            .log(LogParams::new("Task", "t1", AuditAction::Update).with_user_id(override_user))
            .await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].performed_by_id(), override_user);
        assert_eq!(entries[0].source_module(), RequestSource::System);
    }

    #[tokio::test]
    async fn test_review_and_sync_helpers() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let (_, ctx) = user_context();

        run_with_context(ctx, async {
            service
                .log_approve("WPS", "w1", None, Some(json!({"level": 2})))
                .await;
            service.log_reject("ITP", "i1", "Missing signatures", None).await;
            service.log_sync("Project", "p1", "ERP", None).await;
            service.log_restore("Project", "p1", Some("mistake")).await;
        })
        .await;

        let entries = store.entries();
        let actions: Vec<_> = entries.iter().map(|e| e.action()).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Approve,
                AuditAction::Reject,
                AuditAction::Sync,
                AuditAction::Restore
            ]
        );
        assert_eq!(entries[0].metadata().unwrap()["level"], 2);
        assert_eq!(entries[1].reason(), Some("Missing signatures"));
        assert_eq!(entries[2].reason(), Some("Synced from ERP"));
        assert_eq!(entries[3].reason(), Some("mistake"));
    }

    #[tokio::test]
    async fn test_log_batch_summarizes_and_caps_ids() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let (_, ctx) = user_context();
        let ids: Vec<String> = (0..150).map(|i| format!("part-{i}")).collect();

        run_with_context(ctx, async {
            service
                .log_batch(
                    BatchLogParams::new(
                        "AssemblyPart",
                        AuditAction::Create,
                        ids,
                        "Imported 150 parts",
                    )
                    .with_metadata(json!({"file": "parts.csv"})),
                )
                .await;
        })
        .await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert!(entry.is_batch());
        assert!(entry.changes().is_none());
        assert_eq!(entry.reason(), Some("Imported 150 parts"));

        let metadata = entry.metadata().unwrap();
        assert_eq!(metadata["file"], "parts.csv");
        assert_eq!(metadata["batchSize"], 150);
        assert_eq!(metadata["entityIds"].as_array().unwrap().len(), 100);
        assert_eq!(metadata["entityIds"][0], "part-0");
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let store = Arc::new(MockStore::failing());
        let service = AuditService::new(store.clone());
        let (_, ctx) = user_context();

        run_with_context(ctx, async {
            service.log_delete("Task", "t1", None).await;
        })
        .await;

        let trail = service.get_trail("Task", "t1", PageRequest::default()).await;
        assert!(trail.is_empty());
        assert_eq!(trail.total, 0);
        assert!(service.get_recent(&RecentFilter::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_trail_passes_through() {
        let store = Arc::new(MockStore::new());
        let service = AuditService::new(store.clone());
        let user = UserId::new();

        for _ in 0..3 {
            service
                .log(LogParams::new("Task", "t1", AuditAction::Update).with_user_id(user))
                .await;
        }

        let page = service.get_trail("Task", "t1", PageRequest::new(2, 0)).await;
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
    }
}

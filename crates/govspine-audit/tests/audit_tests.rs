//! Integration tests for the audit service and middleware
//!
//! Runs the full path (middleware, dispatcher, service) against an
//! in-memory SQLite store.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use govspine_audit::{AuditMiddleware, AuditService, BatchLogParams, RecordOp};
use govspine_core::config::AuditConfig;
use govspine_core::context::run_with_context;
use govspine_core::domain::{AuditAction, PageRequest, RequestContext, RequestSource, UserId};
use govspine_core::ports::RecentFilter;
use govspine_store::{DatabasePool, SqliteGovernanceStore};

async fn setup() -> (Arc<SqliteGovernanceStore>, UserId) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteGovernanceStore::new(pool.pool().clone()));
    let user = UserId::new();
    store.register_actor(user, "Grace Hopper").await.unwrap();
    (store, user)
}

#[derive(Serialize)]
struct AssemblyPart {
    id: String,
    mark: String,
    weight_kg: f64,
    created_at: String,
}

#[tokio::test]
async fn test_create_then_update_trail() {
    let (store, user) = setup().await;
    let service = AuditService::new(store.clone());
    let ctx = RequestContext::new(Some(user)).with_source(RequestSource::Ui);

    run_with_context(ctx, async {
        service
            .log_create("Building", "b1", &json!({"name": "A", "designation": "X"}), None)
            .await;
        service
            .log_update(
                "Building",
                "b1",
                &json!({"name": "A", "designation": "X"}),
                &json!({"name": "B", "designation": "X"}),
                None,
            )
            .await;
    })
    .await;

    let trail = service.get_trail("Building", "b1", PageRequest::default()).await;
    assert_eq!(trail.total, 2);

    let update = &trail.items[0];
    assert_eq!(update.entry.action(), AuditAction::Update);
    let changes = update.entry.changes().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes["name"].old, json!("A"));
    assert_eq!(changes["name"].new, json!("B"));
    assert_eq!(update.performed_by.name.as_deref(), Some("Grace Hopper"));

    let create = &trail.items[1];
    assert_eq!(create.entry.action(), AuditAction::Create);
    let changes = create.entry.changes().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes["designation"].old, serde_json::Value::Null);
    assert_eq!(changes["designation"].new, json!("X"));
    assert_eq!(create.entry.source_module(), RequestSource::Ui);
}

#[tokio::test]
async fn test_fifteen_creates_in_one_request_give_ten_entries() {
    let (store, user) = setup().await;
    let middleware = AuditMiddleware::spawn(store.clone(), &AuditConfig::default());

    run_with_context(RequestContext::new(Some(user)), async {
        for i in 0..15 {
            let part = AssemblyPart {
                id: format!("ap-{i}"),
                mark: format!("B{i}"),
                weight_kg: 12.5,
                created_at: "2026-10-18T00:00:00Z".into(),
            };
            middleware
                .around_record("AssemblyPart", RecordOp::Create, async move {
                    Ok::<_, anyhow::Error>(part)
                })
                .await
                .unwrap();
        }
    })
    .await;

    middleware.dispatcher().flush().await;

    let recent = AuditService::new(store.clone())
        .get_recent(&RecentFilter::new().with_entity_type("AssemblyPart"))
        .await;
    assert_eq!(recent.len(), 10);
    assert!(recent.iter().all(|r| r.entry.action() == AuditAction::Create));

    let first = recent
        .iter()
        .find(|r| r.entry.entity_id() == "ap-0")
        .unwrap();
    let changes = first.entry.changes().unwrap();
    assert!(changes.contains_key("mark"));
    assert!(!changes.contains_key("created_at"));

    middleware.dispatcher().shutdown().await;
}

#[tokio::test]
async fn test_separate_requests_have_separate_counters() {
    let (store, user) = setup().await;
    let middleware = AuditMiddleware::spawn(store.clone(), &AuditConfig::default());

    for request in 0..2 {
        run_with_context(RequestContext::new(Some(user)), async {
            for i in 0..8 {
                middleware
                    .around_record("Task", RecordOp::Update, async move {
                        Ok::<_, anyhow::Error>(json!({"id": format!("t{request}-{i}")}))
                    })
                    .await
                    .unwrap();
            }
        })
        .await;
    }

    middleware.dispatcher().flush().await;

    let recent = AuditService::new(store.clone())
        .get_recent(&RecentFilter::new().with_action(AuditAction::Update))
        .await;
    assert_eq!(recent.len(), 16);
}

#[tokio::test]
async fn test_batch_entry_persists_summary() {
    let (store, user) = setup().await;
    let service = AuditService::new(store.clone());
    let ids: Vec<String> = (0..120).map(|i| format!("b{i}")).collect();

    run_with_context(RequestContext::new(Some(user)), async {
        service
            .log_batch(BatchLogParams::new(
                "Building",
                AuditAction::Delete,
                ids,
                "Bulk soft delete: cleanup",
            ))
            .await;
    })
    .await;

    let recent = service
        .get_recent(&RecentFilter::new().with_user_id(user).with_limit(5))
        .await;
    assert_eq!(recent.len(), 1);
    let entry = &recent[0].entry;
    assert!(entry.is_batch());
    assert_eq!(entry.reason(), Some("Bulk soft delete: cleanup"));
    assert_eq!(entry.metadata().unwrap()["batchSize"], 120);
    assert_eq!(
        entry.metadata().unwrap()["entityIds"].as_array().unwrap().len(),
        100
    );
}

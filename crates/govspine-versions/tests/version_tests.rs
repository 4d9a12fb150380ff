//! Integration tests for VersionService against SQLite

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use govspine_core::config::VersionsConfig;
use govspine_core::context::run_with_context;
use govspine_core::domain::{PageRequest, RequestContext, UserId};
use govspine_store::{DatabasePool, SqliteGovernanceStore};
use govspine_versions::{CreateVersionParams, VersionService};

async fn setup(config: VersionsConfig) -> (VersionService, UserId) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteGovernanceStore::new(pool.pool().clone()));
    let user = UserId::new();
    store.register_actor(user, "Ada Lovelace").await.unwrap();
    (VersionService::with_config(store, config), user)
}

fn building(rev: u32) -> CreateVersionParams {
    CreateVersionParams::new("Building", "b1", json!({"name": format!("rev {rev}")}))
        .with_change_reason(format!("revision {rev}"))
}

#[tokio::test]
async fn test_three_versions_history_newest_first() {
    let (service, user) = setup(VersionsConfig::default()).await;

    let numbers = run_with_context(RequestContext::new(Some(user)), async {
        let mut numbers = Vec::new();
        for rev in 1..=3 {
            numbers.push(service.create_version(building(rev)).await);
        }
        numbers
    })
    .await;
    assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);

    let history = service
        .get_history("Building", "b1", PageRequest::default())
        .await;
    assert_eq!(history.total, 3);
    let order: Vec<u32> = history.items.iter().map(|v| v.version_number).collect();
    assert_eq!(order, vec![3, 2, 1]);
    assert_eq!(history.items[0].created_by.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(history.items[0].change_reason.as_deref(), Some("revision 3"));

    assert_eq!(service.get_latest_version_number("Building", "b1").await, 3);
    assert_eq!(service.get_latest_version_number("Building", "other").await, 0);
}

#[tokio::test]
async fn test_cap_two_keeps_highest_two() {
    let config = VersionsConfig {
        retention: [("Building".to_string(), 2)].into_iter().collect(),
        ..VersionsConfig::default()
    };
    let (service, user) = setup(config).await;

    for rev in 1..=5 {
        service
            .create_version(building(rev).with_user_id(user))
            .await
            .unwrap();
    }

    let history = service
        .get_history("Building", "b1", PageRequest::default())
        .await;
    let kept: Vec<u32> = history.items.iter().map(|v| v.version_number).collect();
    assert_eq!(kept, vec![5, 4]);
    assert_eq!(history.total, 2);

    // numbering continues after pruning
    let next = service
        .create_version(building(6).with_user_id(user))
        .await;
    assert_eq!(next, Some(6));
}

#[tokio::test]
async fn test_keep_all_policy_never_prunes() {
    let config = VersionsConfig {
        default_retention: 1,
        ..VersionsConfig::default()
    };
    let (service, user) = setup(config).await;

    for _ in 0..4 {
        service
            .create_version(
                CreateVersionParams::new("Project", "p1", json!({"status": "open"}))
                    .with_user_id(user),
            )
            .await;
        service
            .create_version(
                CreateVersionParams::new("Task", "t1", json!({"status": "open"}))
                    .with_user_id(user),
            )
            .await;
    }

    let project = service.get_history("Project", "p1", PageRequest::default()).await;
    let task = service.get_history("Task", "t1", PageRequest::default()).await;
    assert_eq!(project.total, 4);
    assert_eq!(task.total, 1);
    assert_eq!(task.items[0].version_number, 4);
}

#[tokio::test]
async fn test_point_in_time_and_exact_reads() {
    let (service, user) = setup(VersionsConfig::default()).await;
    let before = Utc::now() - Duration::seconds(1);

    service
        .create_version(building(1).with_user_id(user))
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let between = Utc::now();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    service
        .create_version(building(2).with_user_id(user))
        .await;

    assert!(service.get_version_at("Building", "b1", before).await.is_none());

    let at_between = service
        .get_version_at("Building", "b1", between)
        .await
        .unwrap();
    assert_eq!(at_between.version_number, 1);

    let latest = service
        .get_version_at("Building", "b1", Utc::now())
        .await
        .unwrap();
    assert_eq!(latest.version_number, 2);

    let exact = service.get_version("Building", "b1", 2).await.unwrap();
    assert_eq!(exact.snapshot, json!({"name": "rev 2"}));
    assert_eq!(exact.created_by.name.as_deref(), Some("Ada Lovelace"));
    assert!(service.get_version("Building", "b1", 3).await.is_none());

    let diff = service
        .compare_versions("Building", "b1", 1, 2)
        .await
        .unwrap();
    assert_eq!(diff.changed["name"].old, json!("rev 1"));
    assert!(diff.added.is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_are_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::new(&dir.path().join("versions.db"))
        .await
        .unwrap();
    let store = Arc::new(SqliteGovernanceStore::new(pool.pool().clone()));
    let service = Arc::new(VersionService::new(store));
    let user = UserId::new();

    let mut handles = Vec::new();
    for rev in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .create_version(building(rev).with_user_id(user))
                .await
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap());
    }
    numbers.sort_unstable();

    assert_eq!(numbers, (1..=10).collect::<Vec<u32>>());
}

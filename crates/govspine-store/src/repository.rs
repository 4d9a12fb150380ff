//! SQLite implementation of the governance store ports
//!
//! This module provides the concrete SQLite-based implementation of every
//! storage port defined in govspine-core. It handles all domain type
//! serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type            | SQL Type | Strategy                                  |
//! |------------------------|----------|-------------------------------------------|
//! | UserId, RequestId      | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | AuditId                | INTEGER  | Row id                                    |
//! | DateTime<Utc>          | TEXT     | RFC 3339, UTC, fixed microseconds         |
//! | AuditAction, Severity  | TEXT     | `.as_str()` / `FromStr`                   |
//! | RequestSource          | TEXT     | `.as_str()` / `FromStr`                   |
//! | Changes                | TEXT     | serde_json object                         |
//! | snapshot, metadata     | TEXT     | serde_json value                          |

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use govspine_core::domain::{
    Actor, AuditAction, AuditEntry, AuditId, AuditRecord, Changes, DeletedFilter, DeletedItem,
    EntityVersion, NewVersion, Page, PageRequest, RequestId, RequestSource, SoftDeleteEntity,
    SystemEvent, Tombstone, TombstoneWrite, UserId, VersionSummary,
};
use govspine_core::ports::{
    IAuditStore, ISystemEventStore, ITombstoneStore, ITransactionStore, IVersionStore,
    RecentFilter,
};

use crate::StoreError;

/// Transaction handle handed to operations run by the transaction service
pub type SqliteTx = Transaction<'static, Sqlite>;

/// Ids bound per statement in bulk tombstone updates
const BULK_CHUNK: usize = 500;

/// SQLite-based implementation of all governance store ports
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct SqliteGovernanceStore {
    pool: SqlitePool,
}

impl SqliteGovernanceStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Registers (or renames) an actor so read results can show its name
    pub async fn register_actor(&self, id: UserId, name: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO actors (id, name) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(id.to_string())
        .bind(name)
        .execute(&self.pool)
        .await?;

        tracing::trace!(actor_id = %id, "Registered actor");
        Ok(())
    }

    /// Inserts a live row into a soft-deletable entity table
    pub async fn insert_entity(
        &self,
        entity: SoftDeleteEntity,
        id: &str,
        name: &str,
        data: &Value,
    ) -> anyhow::Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, name, data) VALUES (?, ?, ?)",
            entity.table_name()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(data.to_string())
            .execute(&self.pool)
            .await?;

        tracing::trace!(entity_type = %entity, entity_id = %id, "Inserted entity row");
        Ok(())
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Format a timestamp for storage so that text order equals time order
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Try parsing without timezone (SQLite default format)
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_user_id(s: &str) -> Result<UserId, StoreError> {
    UserId::from_str(s).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn parse_json(s: &str, column: &str) -> Result<Value, StoreError> {
    serde_json::from_str(s).map_err(|e| {
        StoreError::SerializationError(format!("Invalid JSON in column '{}': {}", column, e))
    })
}

fn version_number_from_i64(n: i64) -> Result<u32, StoreError> {
    u32::try_from(n)
        .map_err(|_| StoreError::SerializationError(format!("Version number out of range: {}", n)))
}

/// Build an actor from an id column and a joined, optional name column
fn actor_from_row(row: &SqliteRow, id_col: &str, name_col: &str) -> Result<Actor, StoreError> {
    let id: String = row.get(id_col);
    let name: Option<String> = row.get(name_col);
    Ok(Actor::new(parse_user_id(&id)?, name))
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct an AuditRecord from an `audit_log` row joined with `actors`
fn audit_record_from_row(row: &SqliteRow) -> Result<AuditRecord, StoreError> {
    let id: i64 = row.get("id");
    let entity_type: String = row.get("entity_type");
    let entity_id: String = row.get("entity_id");
    let action_str: String = row.get("action");
    let changes_str: Option<String> = row.get("changes");
    let request_id_str: String = row.get("request_id");
    let source_str: String = row.get("source_module");
    let reason: Option<String> = row.get("reason");
    let metadata_str: Option<String> = row.get("metadata");
    let performed_at_str: String = row.get("performed_at");

    let action = AuditAction::from_str(&action_str)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let source = RequestSource::from_str(&source_str)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let request_id = RequestId::from_str(&request_id_str)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let performed_by = actor_from_row(row, "performed_by_id", "performed_by_name")?;

    let mut entry = AuditEntry::new(entity_type, entity_id, action, performed_by.id)
        .with_id(AuditId::new(id))
        .with_request(request_id, source)
        .with_performed_at(parse_datetime(&performed_at_str)?);

    if let Some(ref s) = changes_str {
        let changes: Changes = serde_json::from_str(s)?;
        entry = entry.with_changes(changes);
    }
    if let Some(reason) = reason {
        entry = entry.with_reason(reason);
    }
    if let Some(ref s) = metadata_str {
        entry = entry.with_metadata(parse_json(s, "metadata")?);
    }

    Ok(AuditRecord {
        entry,
        performed_by,
    })
}

/// Reconstruct an EntityVersion from an `entity_versions` row joined with `actors`
fn version_from_row(row: &SqliteRow) -> Result<EntityVersion, StoreError> {
    let snapshot_str: String = row.get("snapshot");
    let created_at_str: String = row.get("created_at");

    Ok(EntityVersion {
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        version_number: version_number_from_i64(row.get("version_number"))?,
        snapshot: parse_json(&snapshot_str, "snapshot")?,
        change_reason: row.get("change_reason"),
        created_by: actor_from_row(row, "created_by_id", "created_by_name")?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

fn version_summary_from_row(row: &SqliteRow) -> Result<VersionSummary, StoreError> {
    let created_at_str: String = row.get("created_at");

    Ok(VersionSummary {
        version_number: version_number_from_i64(row.get("version_number"))?,
        created_at: parse_datetime(&created_at_str)?,
        created_by: actor_from_row(row, "created_by_id", "created_by_name")?,
        change_reason: row.get("change_reason"),
    })
}

fn deleted_item_from_row(row: &SqliteRow) -> Result<DeletedItem, StoreError> {
    let deleted_at_str: String = row.get("deleted_at");
    let deleted_by_id: Option<String> = row.get("deleted_by_id");
    let deleted_by_name: Option<String> = row.get("deleted_by_name");

    let deleted_by = match deleted_by_id {
        Some(ref id) => Some(Actor::new(parse_user_id(id)?, deleted_by_name)),
        None => None,
    };

    Ok(DeletedItem {
        id: row.get("id"),
        name: row.get("name"),
        deleted_at: parse_datetime(&deleted_at_str)?,
        deleted_by,
        delete_reason: row.get("delete_reason"),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ============================================================================
// IAuditStore implementation
// ============================================================================

const AUDIT_SELECT: &str = "SELECT l.*, a.name AS performed_by_name \
     FROM audit_log l LEFT JOIN actors a ON a.id = l.performed_by_id";

#[async_trait::async_trait]
impl IAuditStore for SqliteGovernanceStore {
    async fn insert_audit(&self, entry: &AuditEntry) -> anyhow::Result<AuditId> {
        let changes = entry
            .changes()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Failed to serialize audit changes: {}", e))?;
        let metadata = entry.metadata().map(Value::to_string);

        let row = sqlx::query(
            "INSERT INTO audit_log \
             (entity_type, entity_id, action, changes, performed_by_id, request_id, \
              source_module, reason, metadata, performed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(entry.entity_type())
        .bind(entry.entity_id())
        .bind(entry.action().as_str())
        .bind(&changes)
        .bind(entry.performed_by_id().to_string())
        .bind(entry.request_id().to_string())
        .bind(entry.source_module().as_str())
        .bind(entry.reason())
        .bind(&metadata)
        .bind(format_datetime(&entry.performed_at()))
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        tracing::trace!(
            audit_id = id,
            action = %entry.action(),
            entity_type = %entry.entity_type(),
            "Saved audit entry"
        );
        Ok(AuditId::new(id))
    }

    async fn get_audit_trail(
        &self,
        entity_type: &str,
        entity_id: &str,
        page: PageRequest,
    ) -> anyhow::Result<Page<AuditRecord>> {
        let sql = format!(
            "{AUDIT_SELECT} WHERE l.entity_type = ? AND l.entity_id = ? \
             ORDER BY l.performed_at DESC, l.id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE entity_type = ? AND entity_id = ?")
                .bind(entity_type)
                .bind(entity_id)
                .fetch_one(&self.pool)
                .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(audit_record_from_row(row)?);
        }

        Ok(Page::new(items, total as u64))
    }

    async fn get_recent_audit(&self, filter: &RecentFilter) -> anyhow::Result<Vec<AuditRecord>> {
        let mut sql = format!("{AUDIT_SELECT} WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref entity_type) = filter.entity_type {
            sql.push_str(" AND l.entity_type = ?");
            binds.push(entity_type.clone());
        }

        if let Some(action) = filter.action {
            sql.push_str(" AND l.action = ?");
            binds.push(action.as_str().to_string());
        }

        if let Some(user_id) = filter.user_id {
            sql.push_str(" AND l.performed_by_id = ?");
            binds.push(user_id.to_string());
        }

        sql.push_str(" ORDER BY l.performed_at DESC, l.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query
            .bind(i64::from(filter.limit))
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(audit_record_from_row(row)?);
        }

        Ok(records)
    }
}

// ============================================================================
// IVersionStore implementation
// ============================================================================

const VERSION_SELECT: &str = "SELECT v.*, a.name AS created_by_name \
     FROM entity_versions v LEFT JOIN actors a ON a.id = v.created_by_id";

#[async_trait::async_trait]
impl IVersionStore for SqliteGovernanceStore {
    async fn insert_next_version(&self, version: &NewVersion) -> anyhow::Result<Option<u32>> {
        let result = sqlx::query(
            "INSERT INTO entity_versions \
             (entity_type, entity_id, version_number, snapshot, change_reason, created_by_id, created_at) \
             SELECT ?, ?, COALESCE(MAX(version_number), 0) + 1, ?, ?, ?, ? \
             FROM entity_versions WHERE entity_type = ? AND entity_id = ? \
             RETURNING version_number",
        )
        .bind(&version.entity_type)
        .bind(&version.entity_id)
        .bind(version.snapshot.to_string())
        .bind(&version.change_reason)
        .bind(version.created_by_id.to_string())
        .bind(format_datetime(&Utc::now()))
        .bind(&version.entity_type)
        .bind(&version.entity_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let number = version_number_from_i64(row.get("version_number"))?;
                tracing::trace!(
                    entity_type = %version.entity_type,
                    entity_id = %version.entity_id,
                    version = number,
                    "Saved entity version"
                );
                Ok(Some(number))
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tracing::debug!(
                    entity_type = %version.entity_type,
                    entity_id = %version.entity_id,
                    "Version number claimed concurrently"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_version(
        &self,
        entity_type: &str,
        entity_id: &str,
        version_number: u32,
    ) -> anyhow::Result<Option<EntityVersion>> {
        let sql = format!(
            "{VERSION_SELECT} WHERE v.entity_type = ? AND v.entity_id = ? AND v.version_number = ?"
        );
        let row = sqlx::query(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .bind(i64::from(version_number))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(version_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_version_at(
        &self,
        entity_type: &str,
        entity_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<EntityVersion>> {
        let sql = format!(
            "{VERSION_SELECT} WHERE v.entity_type = ? AND v.entity_id = ? AND v.created_at <= ? \
             ORDER BY v.created_at DESC, v.version_number DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .bind(format_datetime(&at))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(version_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_version_history(
        &self,
        entity_type: &str,
        entity_id: &str,
        page: PageRequest,
    ) -> anyhow::Result<Page<VersionSummary>> {
        let rows = sqlx::query(
            "SELECT v.version_number, v.created_at, v.created_by_id, v.change_reason, \
             a.name AS created_by_name \
             FROM entity_versions v LEFT JOIN actors a ON a.id = v.created_by_id \
             WHERE v.entity_type = ? AND v.entity_id = ? \
             ORDER BY v.version_number DESC LIMIT ? OFFSET ?",
        )
            .bind(entity_type)
            .bind(entity_id)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entity_versions WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(version_summary_from_row(row)?);
        }

        Ok(Page::new(items, total as u64))
    }

    async fn latest_version_number(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> anyhow::Result<u32> {
        let latest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version_number) FROM entity_versions WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(version_number_from_i64(latest.unwrap_or(0))?)
    }

    async fn prune_versions(
        &self,
        entity_type: &str,
        entity_id: &str,
        keep: u32,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM entity_versions \
             WHERE entity_type = ? AND entity_id = ? AND version_number NOT IN ( \
                 SELECT version_number FROM entity_versions \
                 WHERE entity_type = ? AND entity_id = ? \
                 ORDER BY version_number DESC LIMIT ? \
             )",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(i64::from(keep))
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tracing::debug!(
                entity_type = %entity_type,
                entity_id = %entity_id,
                removed,
                keep,
                "Pruned entity versions"
            );
        }
        Ok(removed)
    }
}

// ============================================================================
// ITombstoneStore implementation
// ============================================================================

impl SqliteGovernanceStore {
    async fn row_exists(&self, entity: SoftDeleteEntity, id: &str) -> anyhow::Result<bool> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", entity.table_name());
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait::async_trait]
impl ITombstoneStore for SqliteGovernanceStore {
    async fn mark_deleted(
        &self,
        entity: SoftDeleteEntity,
        id: &str,
        tombstone: &Tombstone,
    ) -> anyhow::Result<TombstoneWrite> {
        let sql = format!(
            "UPDATE {} SET deleted_at = ?, deleted_by_id = ?, delete_reason = ? \
             WHERE id = ? AND deleted_at IS NULL",
            entity.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(format_datetime(&tombstone.deleted_at))
            .bind(tombstone.deleted_by_id.to_string())
            .bind(&tombstone.delete_reason)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::trace!(entity_type = %entity, entity_id = %id, "Tombstone set");
            return Ok(TombstoneWrite::Applied);
        }

        if self.row_exists(entity, id).await? {
            Ok(TombstoneWrite::Unchanged)
        } else {
            Ok(TombstoneWrite::NotFound)
        }
    }

    async fn clear_tombstone(
        &self,
        entity: SoftDeleteEntity,
        id: &str,
    ) -> anyhow::Result<TombstoneWrite> {
        let sql = format!(
            "UPDATE {} SET deleted_at = NULL, deleted_by_id = NULL, delete_reason = NULL \
             WHERE id = ? AND deleted_at IS NOT NULL",
            entity.table_name()
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        if result.rows_affected() > 0 {
            tracing::trace!(entity_type = %entity, entity_id = %id, "Tombstone cleared");
            return Ok(TombstoneWrite::Applied);
        }

        if self.row_exists(entity, id).await? {
            Ok(TombstoneWrite::Unchanged)
        } else {
            Ok(TombstoneWrite::NotFound)
        }
    }

    async fn mark_deleted_bulk(
        &self,
        entity: SoftDeleteEntity,
        ids: &[String],
        tombstone: &Tombstone,
    ) -> anyhow::Result<u64> {
        let deleted_at = format_datetime(&tombstone.deleted_at);
        let deleted_by = tombstone.deleted_by_id.to_string();
        let mut written = 0;

        // All chunks commit together or not at all
        let mut tx = self.pool.begin().await?;
        for chunk in ids.chunks(BULK_CHUNK) {
            let sql = format!(
                "UPDATE {} SET deleted_at = ?, deleted_by_id = ?, delete_reason = ? \
                 WHERE deleted_at IS NULL AND id IN ({})",
                entity.table_name(),
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql)
                .bind(&deleted_at)
                .bind(&deleted_by)
                .bind(&tombstone.delete_reason);
            for id in chunk {
                query = query.bind(id);
            }
            written += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(
            entity_type = %entity,
            requested = ids.len(),
            written,
            "Bulk tombstone update"
        );
        Ok(written)
    }

    async fn list_deleted(
        &self,
        entity: SoftDeleteEntity,
        filter: &DeletedFilter,
    ) -> anyhow::Result<Page<DeletedItem>> {
        let mut conditions = String::from(" WHERE t.deleted_at IS NOT NULL");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref after) = filter.deleted_after {
            conditions.push_str(" AND t.deleted_at >= ?");
            binds.push(format_datetime(after));
        }

        if let Some(ref before) = filter.deleted_before {
            conditions.push_str(" AND t.deleted_at <= ?");
            binds.push(format_datetime(before));
        }

        let sql = format!(
            "SELECT t.id, t.name, t.deleted_at, t.deleted_by_id, t.delete_reason, \
             a.name AS deleted_by_name \
             FROM {} t LEFT JOIN actors a ON a.id = t.deleted_by_id{} \
             ORDER BY t.deleted_at DESC, t.id ASC LIMIT ? OFFSET ?",
            entity.table_name(),
            conditions
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query
            .bind(i64::from(filter.page.limit))
            .bind(i64::from(filter.page.offset))
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM {} t{}",
            entity.table_name(),
            conditions
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(deleted_item_from_row(row)?);
        }

        Ok(Page::new(items, total as u64))
    }

    async fn is_deleted(&self, entity: SoftDeleteEntity, id: &str) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT CASE WHEN deleted_at IS NULL THEN 0 ELSE 1 END FROM {} WHERE id = ?",
            entity.table_name()
        );
        let deleted: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(deleted == Some(1))
    }
}

// ============================================================================
// ISystemEventStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ISystemEventStore for SqliteGovernanceStore {
    async fn save_event(&self, event: &SystemEvent) -> anyhow::Result<i64> {
        let row = sqlx::query(
            "INSERT INTO system_events \
             (event_type, category, severity, title, description, request_id, \
              entity_type, entity_id, user_id, metadata, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&event.event_type)
        .bind(&event.category)
        .bind(event.severity.as_str())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.request_id.to_string())
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(event.user_id.map(|u| u.to_string()))
        .bind(event.metadata.to_string())
        .bind(format_datetime(&event.created_at))
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        tracing::trace!(event_id = id, event_type = %event.event_type, "Saved system event");
        Ok(id)
    }
}

// ============================================================================
// ITransactionStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ITransactionStore for SqliteGovernanceStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> anyhow::Result<SqliteTx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: SqliteTx) -> anyhow::Result<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: SqliteTx) -> anyhow::Result<()> {
        tx.rollback().await?;
        Ok(())
    }
}

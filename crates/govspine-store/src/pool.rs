//! SQLite pool for the governance store
//!
//! File databases run in WAL mode with foreign keys on. How long a caller
//! may wait for a connection follows `transactions.max_wait_ms`, so a
//! saturated pool fails a transaction begin in the same window the
//! transaction service allows for it. The schema is applied on open.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use govspine_core::config::GovernanceConfig;

use crate::StoreError;

const SCHEMA: &str = include_str!("migrations/20261018_initial.sql");

/// Connection limits for a [`DatabasePool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Longest wait for a free connection
    pub acquire_timeout: Duration,
    /// Longest wait on a locked database before SQLite gives up
    pub busy_timeout: Duration,
}

impl PoolSettings {
    /// Settings matching the transaction limits of `config`
    pub fn from_config(config: &GovernanceConfig) -> Self {
        let max_wait = config.transactions.max_wait();
        Self {
            max_connections: 5,
            acquire_timeout: max_wait,
            busy_timeout: max_wait.min(Duration::from_secs(5)),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&GovernanceConfig::default())
    }
}

/// Shared SQLite pool with the governance schema applied
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
    settings: PoolSettings,
}

impl DatabasePool {
    /// Opens the database named by `database.path` with limits from the
    /// `transactions` section.
    pub async fn open(config: &GovernanceConfig) -> Result<Self, StoreError> {
        Self::with_settings(&config.database.path, PoolSettings::from_config(config)).await
    }

    /// Opens (creating if needed) the database at `db_path` with default limits
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        Self::with_settings(db_path, PoolSettings::default()).await
    }

    pub async fn with_settings(db_path: &Path, settings: PoolSettings) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(settings.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!("cannot open {}: {e}", db_path.display()))
            })?;

        apply_schema(&pool).await?;

        tracing::info!(
            path = %db_path.display(),
            max_connections = settings.max_connections,
            acquire_timeout_ms = settings.acquire_timeout.as_millis() as u64,
            "Governance store opened"
        );

        Ok(Self { pool, settings })
    }

    /// Private in-memory database on a single connection.
    ///
    /// An open transaction holds that connection, so other queries wait
    /// (up to the acquire timeout) until it ends.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let settings = PoolSettings {
            max_connections: 1,
            ..PoolSettings::default()
        };
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionFailed(format!("in-memory database: {e}")))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("in-memory database: {e}")))?;

        apply_schema(&pool).await?;
        tracing::debug!("In-memory governance store opened");

        Ok(Self { pool, settings })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }
}

// Every statement in the schema is `IF NOT EXISTS`, so reopening is harmless.
async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("initial schema: {e}")))?;
    tracing::debug!("Governance schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use govspine_core::config::ConfigBuilder;

    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_creates_schema() {
        let pool = DatabasePool::in_memory().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(pool.pool())
        .await
        .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(n,)| n).collect();

        for expected in [
            "actors",
            "assembly_parts",
            "audit_log",
            "buildings",
            "entity_versions",
            "projects",
            "system_events",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing table {expected}");
        }
        assert_eq!(pool.settings().max_connections, 1);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_dirs_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("governance.db");

        let pool = DatabasePool::new(&path).await.unwrap();
        pool.pool().close().await;
        assert!(path.exists());

        let reopened = DatabasePool::new(&path).await;
        assert!(reopened.is_ok());
    }

    #[test]
    fn test_settings_follow_transaction_max_wait() {
        let config = ConfigBuilder::new()
            .transaction_max_wait(Duration::from_millis(1500))
            .build();
        let settings = PoolSettings::from_config(&config);
        assert_eq!(settings.acquire_timeout, Duration::from_millis(1500));
        assert_eq!(settings.busy_timeout, Duration::from_millis(1500));

        let defaults = PoolSettings::default();
        assert_eq!(defaults.acquire_timeout, Duration::from_secs(10));
        assert_eq!(defaults.busy_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_open_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GovernanceConfig::default();
        config.database.path = dir.path().join("spine.db");
        config.transactions.max_wait_ms = 250;

        let pool = DatabasePool::open(&config).await.unwrap();
        assert!(config.database.path.exists());
        assert_eq!(pool.settings().acquire_timeout, Duration::from_millis(250));
    }
}

//! Govspine Store - SQLite persistence for the governance spine
//!
//! SQLite-based store for:
//! - Audit trail entries
//! - Entity version snapshots
//! - Soft-delete tombstones on the governed entity tables
//! - System (failure) events
//! - Actor display names
//!
//! ## Architecture
//!
//! This crate implements every storage port from `govspine-core` with one
//! SQLite adapter. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteGovernanceStore`] - Implementation of all store ports
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use govspine_store::{DatabasePool, SqliteGovernanceStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/govspine/governance.db")).await?;
//! let store = SqliteGovernanceStore::new(pool.pool().clone());
//! // Hand the store to the audit, version, soft-delete and transaction services...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteGovernanceStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}

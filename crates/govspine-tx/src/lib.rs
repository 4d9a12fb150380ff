//! Govspine Tx - safe transactions
//!
//! Runs multi-step writes inside a store transaction with a bounded begin
//! wait and an execution timeout. Failures roll back, are recorded as
//! `transaction_failed` system events and come back as typed results.
//!
//! ## Key Components
//!
//! - [`TransactionService`] - Single, retried and chunked batch transactions
//! - [`TransactionContext`] - Operation name and attribution for failure records
//! - [`TransactionError`] - Why a transaction attempt failed
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use govspine_store::{DatabasePool, SqliteGovernanceStore};
//! use govspine_tx::{TransactionContext, TransactionService};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::in_memory().await?;
//! let service = TransactionService::new(Arc::new(SqliteGovernanceStore::new(pool.pool().clone())));
//!
//! let outcome = service
//!     .safe_transaction(&TransactionContext::new("rename_building"), |tx| {
//!         Box::pin(async move {
//!             sqlx::query("UPDATE buildings SET name = 'B' WHERE id = 'b1'")
//!                 .execute(&mut **tx)
//!                 .await?;
//!             Ok(())
//!         })
//!     })
//!     .await;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod service;

pub use error::{is_non_retryable, TransactionError};
pub use service::{
    BatchError, BatchOptions, BatchResult, RetryOptions, TransactionContext, TransactionResult,
    TransactionService,
};

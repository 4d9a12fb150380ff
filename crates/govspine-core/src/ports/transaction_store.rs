//! Transaction store port
//!
//! Lets the transaction service drive begin/commit/rollback without knowing
//! the adapter. The associated `Tx` is the adapter's own transaction handle
//! and is what the caller's operations receive.

/// Port trait for store transactions
///
/// ## Implementation Notes
///
/// - Dropping a `Tx` without committing must roll it back.
/// - `begin` may wait for a connection; callers bound that wait themselves.
#[async_trait::async_trait]
pub trait ITransactionStore: Send + Sync {
    /// Adapter transaction handle
    type Tx: Send;

    async fn begin(&self) -> anyhow::Result<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> anyhow::Result<()>;

    async fn rollback(&self, tx: Self::Tx) -> anyhow::Result<()>;
}

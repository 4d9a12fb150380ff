//! System event store port

use crate::domain::SystemEvent;

/// Port trait for failure-record storage (write-only)
#[async_trait::async_trait]
pub trait ISystemEventStore: Send + Sync {
    /// Persists the event and returns its row id
    async fn save_event(&self, event: &SystemEvent) -> anyhow::Result<i64>;
}

//! Audit store port
//!
//! Storage for append-only audit entries.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   the audit service only logs them.
//! - Entries are append-only, so there is no update or delete operation.

use crate::domain::{
    page::DEFAULT_PAGE_LIMIT, AuditAction, AuditEntry, AuditId, AuditRecord, Page, PageRequest,
    UserId,
};

/// Filter criteria for the recent-activity feed
///
/// All fields are optional; set fields are combined with AND logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentFilter {
    pub entity_type: Option<String>,
    pub action: Option<AuditAction>,
    pub user_id: Option<UserId>,
    pub limit: u32,
}

impl Default for RecentFilter {
    fn default() -> Self {
        Self {
            entity_type: None,
            action: None,
            user_id: None,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl RecentFilter {
    /// Creates a new empty filter (matches all entries)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Port trait for audit entry storage
#[async_trait::async_trait]
pub trait IAuditStore: Send + Sync {
    /// Appends an entry and returns its assigned id
    async fn insert_audit(&self, entry: &AuditEntry) -> anyhow::Result<AuditId>;

    /// Entries for one entity, newest first, plus the total count for that entity
    async fn get_audit_trail(
        &self,
        entity_type: &str,
        entity_id: &str,
        page: PageRequest,
    ) -> anyhow::Result<Page<AuditRecord>>;

    /// Most recent entries across all entities, newest first
    async fn get_recent_audit(&self, filter: &RecentFilter) -> anyhow::Result<Vec<AuditRecord>>;
}

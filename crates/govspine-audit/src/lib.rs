//! Govspine Audit - Audit trail and mutation interception
//!
//! Provides:
//! - `AuditService`: best-effort recording and querying of audit entries
//! - `AuditMiddleware`: hooks that wrap repository mutations and log them
//! - `AuditDispatcher`: bounded background queue the middleware writes through
//! - `RecordCleaner`: strips noisy or sensitive fields before logging
//! - `BatchTracker`: per-request counters that suppress bulk noise

pub mod batch;
pub mod cleaner;
pub mod dispatcher;
pub mod middleware;
pub mod service;

pub use batch::BatchTracker;
pub use cleaner::RecordCleaner;
pub use dispatcher::{AuditDispatcher, AuditJob, DispatcherStats};
pub use middleware::{AuditMiddleware, BulkOp, RecordOp};
pub use service::{AuditService, BatchLogParams, LogParams};

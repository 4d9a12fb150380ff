//! Domain error types
//!
//! Parsing and validation failures for the governance domain types.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown audit action name
    #[error("Unknown audit action: {0}")]
    UnknownAction(String),

    /// Unknown request source name
    #[error("Unknown request source: {0}")]
    UnknownSource(String),

    /// Entity type is not in the soft-delete allowlist
    #[error("Entity type {0} does not support soft delete")]
    SoftDeleteUnsupported(String),

    /// Unknown system event severity
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),
}

//! Soft-delete failure reasons

use govspine_core::domain::SoftDeleteEntity;
use thiserror::Error;

/// Why a soft-delete operation did not succeed
///
/// Never returned as `Err`; its message becomes the `error` field of the
/// operation result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SoftDeleteError {
    #[error("User ID required for deletion")]
    DeleteUserRequired,

    #[error("User ID required for restoration")]
    RestoreUserRequired,

    #[error("{entity} {id} not found")]
    NotFound { entity: SoftDeleteEntity, id: String },

    /// The store rejected the write
    #[error("{0}")]
    Store(String),
}

impl From<anyhow::Error> for SoftDeleteError {
    fn from(e: anyhow::Error) -> Self {
        SoftDeleteError::Store(e.to_string())
    }
}

//! Transaction failure types and retry classification

use std::time::Duration;

use thiserror::Error;

/// Message fragments of errors that will fail the same way on every attempt.
///
/// Matched case-insensitively so both SQLite (`UNIQUE constraint failed`)
/// and other driver spellings (`Unique constraint failed`) are caught.
const NON_RETRYABLE: &[&str] = &[
    "unique constraint",
    "foreign key constraint",
    "record not found",
];

/// Why a transaction attempt failed
///
/// Messages carry the underlying error text verbatim (with its context
/// chain) so classification works on them.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Transaction could not start within {0:?}")]
    BeginTimeout(Duration),

    #[error("{0:#}")]
    Begin(anyhow::Error),

    #[error("Transaction timed out after {0:?}")]
    ExecutionTimeout(Duration),

    /// The caller's operations returned an error
    #[error("{0:#}")]
    Operation(anyhow::Error),

    #[error("Commit failed: {0:#}")]
    Commit(anyhow::Error),
}

impl TransactionError {
    /// Messages of the error and its sources, outermost first
    pub fn chain(&self) -> Vec<String> {
        match self {
            TransactionError::Begin(e)
            | TransactionError::Operation(e)
            | TransactionError::Commit(e) => e.chain().map(|c| c.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }

    pub fn is_retryable(&self) -> bool {
        !is_non_retryable(&self.to_string())
    }
}

/// True when `message` names a constraint or missing-record failure
pub fn is_non_retryable(message: &str) -> bool {
    let message = message.to_lowercase();
    NON_RETRYABLE.iter().any(|fragment| message.contains(fragment))
}

//! Error types for the task queue and the worker boundary.
//!
//! `QueueError` covers enqueue and task persistence.
//! `ExecutionError` is what a task run can fail with; the worker inspects
//! `is_permanent` to choose between retry and terminal failure.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::dedupe::StoreError;
use crate::pipeline::review::ReviewError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unsupported site_id: {0}")]
    UnsupportedSite(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Row store error: {0}")]
    Store(#[from] StoreError),

    #[error("Append failed: {0}")]
    Append(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Review queue error: {0}")]
    Review(#[from] ReviewError),
}

impl ExecutionError {
    /// Permanent failures go straight to `failed` without consuming retries.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::UnsupportedSite(_) | Self::InvalidTask(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_classification() {
        assert!(ExecutionError::UnsupportedSite("99".into()).is_permanent());
        assert!(ExecutionError::InvalidTask("bad window".into()).is_permanent());
        assert!(!ExecutionError::Source("timeout".into()).is_permanent());
        assert!(!ExecutionError::Append("quota".into()).is_permanent());
        assert!(!ExecutionError::Store(StoreError::Schema("width".into())).is_permanent());
    }

    #[test]
    fn unsupported_site_message() {
        let err = ExecutionError::UnsupportedSite("99".into());
        assert_eq!(err.to_string(), "Unsupported site_id: 99");
    }
}

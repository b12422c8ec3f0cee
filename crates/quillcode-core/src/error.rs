//! Engine error types.

use quillcode_provider::GatewayError;
use quillcode_storage::StorageError;
use quillcode_tools::ToolError;
use thiserror::Error;

/// Result type for engine operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that can occur while driving a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Invalid input or state.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider request failed.
    #[error("Provider error: {0}")]
    Provider(#[from] GatewayError),

    /// A tool failed in a way the executor could not turn into a result.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Reading or writing conversation state failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A queued write failed after its call already returned.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Lock was poisoned (another thread panicked while holding the lock).
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// The task was aborted.
    #[error("Task aborted")]
    Aborted,

    /// A pending ask was replaced by a newer one before being answered.
    #[error("Ask superseded by a newer ask")]
    Superseded,
}

impl TaskError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }
}

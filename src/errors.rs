//! Typed error hierarchy for the task board.
//!
//! Three enums follow the component layering:
//! - `RemoteError`: persistence service calls (network, validation, not found)
//! - `SyncError`: synchronizer operations
//! - `BoardError`: board controller input and load state

use thiserror::Error;

use crate::board::models::TaskId;

/// Failures of a single call against the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport failure, undecodable response or unexpected non-2xx status.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid task: {0}")]
    Validation(String),

    #[error("Task {0} not found")]
    NotFound(TaskId),
}

/// Errors from the synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Task {0} is not on the board")]
    UnknownTask(TaskId),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownTask(_) | SyncError::Remote(RemoteError::NotFound(_))
        )
    }
}

/// Errors surfaced by the board controller.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Task {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Board has not been loaded yet")]
    NotLoaded,

    #[error("Failed to load tasks: {0}")]
    LoadFailed(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

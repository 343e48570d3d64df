//! Storage error types for flowdesk-storage.
//!
//! [`StorageError`] covers every failure mode of the persistence gateway and
//! the task store: SQLite and migration failures, serialization, missing
//! records, rejected patch batches and integrity violations.

use flowdesk_core::error::CoreError;
use flowdesk_core::id::{DiagramId, TaskId};
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed while opening the database.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No diagram with the given id.
    #[error("diagram not found: {0}")]
    DiagramNotFound(DiagramId),

    /// No task with the given id.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The patch batch was rejected by the engine; nothing was written.
    #[error("patch rejected: {0}")]
    Rejected(#[from] CoreError),

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}

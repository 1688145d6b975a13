//! Repository Error Types
//!
//! Errors raised by repository backends. Service-layer code maps them into
//! [`ContentRepositoryError`](crate::services::ContentRepositoryError).

use thiserror::Error;
use uuid::Uuid;

/// Repository operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// A uniqueness key is already taken in the workspace
    #[error("Duplicate key {key} in workspace {workspace}")]
    DuplicateKey { key: String, workspace: String },

    /// Write against a stale record version (optimistic locking)
    #[error("Version conflict for record {persistence_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        persistence_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Record to update or remove does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Workspace name is already taken
    #[error("Workspace already exists: {0}")]
    WorkspaceExists(String),

    /// Backend specific failure
    #[error("Repository backend failure: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// Create a duplicate key error
    pub fn duplicate_key(key: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self::DuplicateKey {
            key: key.into(),
            workspace: workspace.into(),
        }
    }

    /// Create a version conflict error
    pub fn version_conflict(persistence_id: Uuid, expected: i64, actual: i64) -> Self {
        Self::VersionConflict {
            persistence_id,
            expected,
            actual,
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

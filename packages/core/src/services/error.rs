//! Service Layer Error Types
//!
//! This module defines the error type returned by every content repository
//! service. Preconditions are checked where they are violated; nothing is
//! retried internally.

use crate::db::RepositoryError;
use crate::models::ValidationError;
use thiserror::Error;
use uuid::Uuid;

/// Content repository operation errors
#[derive(Error, Debug)]
pub enum ContentRepositoryError {
    /// Path fails the path grammar or length limit
    #[error("Invalid path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    /// Node name fails the name grammar
    #[error("Invalid node name: \"{name}\"")]
    InvalidNodeName { name: String },

    /// Another node already occupies the path in this workspace and dimensions
    #[error("Node already exists at {path} in workspace {workspace}")]
    NodeAlreadyExists { path: String, workspace: String },

    /// Node required by the operation does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Context lacks a target value for one of its dimensions
    #[error("Invalid node context: {0}")]
    InvalidNodeContext(String),

    /// Publish target is not reachable through the base workspace chain
    #[error("Workspace \"{target}\" is not a base workspace of \"{workspace}\"")]
    NotABaseWorkspace { workspace: String, target: String },

    /// Workspace required by the operation does not exist
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    /// Workspace name is already taken
    #[error("Workspace already exists: {0}")]
    WorkspaceExists(String),

    /// Node migration cannot run or a rule failed
    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// Write against a stale record version; re-read and retry
    #[error("Concurrent modification of record {persistence_id}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        persistence_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Node type is not configured
    #[error("Node type not found: {0}")]
    NodeTypeNotFound(String),

    /// Repository configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A rename or removal would touch more records than allowed
    #[error("Cascade of {count} records at {path} exceeds the limit of {limit}")]
    CascadeLimitExceeded {
        path: String,
        count: usize,
        limit: usize,
    },

    /// Repository backend failed
    #[error("Repository operation failed: {0}")]
    Repository(RepositoryError),
}

impl ContentRepositoryError {
    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a node already exists error
    pub fn node_already_exists(path: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self::NodeAlreadyExists {
            path: path.into(),
            workspace: workspace.into(),
        }
    }

    /// Create a node not found error
    pub fn node_not_found(what: impl Into<String>) -> Self {
        Self::NodeNotFound(what.into())
    }

    /// Create a not-a-base-workspace error
    pub fn not_a_base_workspace(workspace: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NotABaseWorkspace {
            workspace: workspace.into(),
            target: target.into(),
        }
    }

    /// Create a workspace not found error
    pub fn workspace_not_found(name: impl Into<String>) -> Self {
        Self::WorkspaceNotFound(name.into())
    }

    /// Create a migration error
    pub fn migration(msg: impl Into<String>) -> Self {
        Self::MigrationError(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Whether the caller should re-read and retry
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<ValidationError> for ContentRepositoryError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidPath { path, reason } => Self::InvalidPath { path, reason },
            ValidationError::InvalidNodeName { name } => Self::InvalidNodeName { name },
            ValidationError::InvalidNodeContext { reason } => Self::InvalidNodeContext(reason),
            ValidationError::InvalidArgument(msg) => Self::InvalidArgument(msg),
        }
    }
}

impl From<RepositoryError> for ContentRepositoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateKey { key, workspace } => Self::NodeAlreadyExists {
                path: key,
                workspace,
            },
            RepositoryError::VersionConflict {
                persistence_id,
                expected,
                actual,
            } => Self::ConcurrentModification {
                persistence_id,
                expected,
                actual,
            },
            RepositoryError::WorkspaceExists(name) => Self::WorkspaceExists(name),
            other => Self::Repository(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_variant_for_variant() {
        let err: ContentRepositoryError = ValidationError::InvalidNodeName {
            name: "a/b".to_string(),
        }
        .into();
        assert!(matches!(err, ContentRepositoryError::InvalidNodeName { .. }));

        let err: ContentRepositoryError = ValidationError::InvalidNodeContext {
            reason: "missing language".to_string(),
        }
        .into();
        assert!(matches!(err, ContentRepositoryError::InvalidNodeContext(_)));
    }

    #[test]
    fn test_repository_errors_map_to_taxonomy() {
        let id = Uuid::new_v4();
        let err: ContentRepositoryError = RepositoryError::version_conflict(id, 1, 2).into();
        assert!(err.is_concurrent_modification());

        let err: ContentRepositoryError = RepositoryError::duplicate_key("/a", "live").into();
        assert!(matches!(err, ContentRepositoryError::NodeAlreadyExists { .. }));

        let err: ContentRepositoryError = RepositoryError::Backend("disk full".into()).into();
        assert!(matches!(err, ContentRepositoryError::Repository(_)));
    }
}

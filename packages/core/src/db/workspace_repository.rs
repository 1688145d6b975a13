//! Workspace persistence seam

use crate::db::RepositoryError;
use crate::models::Workspace;
use async_trait::async_trait;
use std::sync::Arc;

/// Stores workspaces by name
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn find_one_by_name(&self, name: &str) -> Result<Option<Arc<Workspace>>, RepositoryError>;

    /// Store a workspace; fails with `WorkspaceExists` if the name is taken
    async fn add(&self, workspace: Workspace) -> Result<Arc<Workspace>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<Arc<Workspace>>, RepositoryError>;
}

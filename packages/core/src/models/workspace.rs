//! Workspace Model
//!
//! A workspace is a named branch of the content tree. Its base workspace is
//! fixed at construction, so the chain of base workspaces can never form a
//! cycle. The publish algorithm itself lives in
//! [`WorkspaceService`](crate::services::WorkspaceService).

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Named branch with an optional base workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    name: String,
    base_workspace: Option<Arc<Workspace>>,
    root_node_identifier: String,
    created_at: DateTime<Utc>,
}

impl Workspace {
    /// Create a workspace; `root_node_identifier` names its `/` record
    pub fn new(
        name: impl Into<String>,
        base_workspace: Option<Arc<Workspace>>,
        root_node_identifier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_workspace,
            root_node_identifier: root_node_identifier.into(),
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_workspace(&self) -> Option<&Arc<Workspace>> {
        self.base_workspace.as_ref()
    }

    /// Whether this workspace has a base, i.e. removals leave tombstones
    pub fn has_base_workspace(&self) -> bool {
        self.base_workspace.is_some()
    }

    pub fn root_node_identifier(&self) -> &str {
        &self.root_node_identifier
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Names of this workspace and all its bases, nearest first
    ///
    /// # Examples
    ///
    /// ```
    /// # use contentrepo_core::models::Workspace;
    /// # use std::sync::Arc;
    /// let live = Arc::new(Workspace::new("live", None, "root-live"));
    /// let review = Arc::new(Workspace::new("review", Some(live), "root-review"));
    /// let user = Workspace::new("user-1", Some(review), "root-user");
    /// assert_eq!(user.workspace_chain(), vec!["user-1", "review", "live"]);
    /// ```
    pub fn workspace_chain(&self) -> Vec<String> {
        let mut chain = vec![self.name.clone()];
        let mut current = self.base_workspace.as_ref();
        while let Some(workspace) = current {
            chain.push(workspace.name.clone());
            current = workspace.base_workspace.as_ref();
        }
        chain
    }

    /// Find `target_name` among the base workspaces, starting at the direct base
    ///
    /// A workspace is never its own publishing target.
    pub fn publishing_target(&self, target_name: &str) -> Option<&Arc<Workspace>> {
        let mut current = self.base_workspace.as_ref();
        while let Some(workspace) = current {
            if workspace.name == target_name {
                return Some(workspace);
            }
            current = workspace.base_workspace.as_ref();
        }
        None
    }
}

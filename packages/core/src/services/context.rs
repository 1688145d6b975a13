//! Context
//!
//! A context is the resolution scope of one unit of work: a workspace name,
//! requested dimension values with their target values, a (simulated) current
//! time and three visibility toggles. It resolves paths and identifiers to
//! records and filters out what the caller should not see:
//!
//! - removed records, unless removed content is shown
//! - hidden records (including the hidden-before/after window evaluated at the
//!   context's current time), unless invisible content is shown
//! - records the security predicate denies, unless inaccessible content is shown
//!
//! Contexts are request-scoped and not shared between tasks. Records fetched
//! from a base workspace or another dimension variant are copied into the
//! context's workspace before they are changed through the context (see
//! [`Context::adopt_node`]).

use crate::db::NodeRecordRepository;
use crate::models::path::{normalize_path, ROOT_PATH};
use crate::models::{DimensionRequest, DimensionValues, NodeRecord, Workspace};
use crate::services::{ContentRepository, ContentRepositoryError, CreateNodeOptions};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type Result<T> = std::result::Result<T, ContentRepositoryError>;

/// Construction properties of a [`Context`]
///
/// Unset dimensions fall back to the configured content dimensions.
#[derive(Debug, Clone)]
pub struct ContextProperties {
    pub workspace_name: String,
    pub current_date_time: Option<DateTime<Utc>>,
    pub dimensions: Option<DimensionRequest>,
    pub target_dimensions: Option<BTreeMap<String, String>>,
    pub invisible_content_shown: bool,
    pub removed_content_shown: bool,
    pub inaccessible_content_shown: bool,
}

impl ContextProperties {
    pub fn new(workspace_name: impl Into<String>) -> Self {
        Self {
            workspace_name: workspace_name.into(),
            current_date_time: None,
            dimensions: None,
            target_dimensions: None,
            invisible_content_shown: false,
            removed_content_shown: false,
            inaccessible_content_shown: false,
        }
    }

    pub fn current_date_time(mut self, now: DateTime<Utc>) -> Self {
        self.current_date_time = Some(now);
        self
    }

    pub fn dimensions(mut self, dimensions: DimensionRequest) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn target_dimensions(mut self, targets: BTreeMap<String, String>) -> Self {
        self.target_dimensions = Some(targets);
        self
    }

    pub fn invisible_content_shown(mut self, shown: bool) -> Self {
        self.invisible_content_shown = shown;
        self
    }

    pub fn removed_content_shown(mut self, shown: bool) -> Self {
        self.removed_content_shown = shown;
        self
    }

    pub fn inaccessible_content_shown(mut self, shown: bool) -> Self {
        self.inaccessible_content_shown = shown;
        self
    }
}

/// Start or end point of [`Context::get_nodes_on_path`]
#[derive(Debug, Clone, Copy)]
pub enum NodePathRef<'a> {
    Path(&'a str),
    Node(&'a NodeRecord),
}

impl<'a> NodePathRef<'a> {
    fn path(&self) -> &'a str {
        match self {
            NodePathRef::Path(path) => path,
            NodePathRef::Node(node) => node.path(),
        }
    }
}

impl<'a> From<&'a str> for NodePathRef<'a> {
    fn from(path: &'a str) -> Self {
        NodePathRef::Path(path)
    }
}

impl<'a> From<&'a NodeRecord> for NodePathRef<'a> {
    fn from(node: &'a NodeRecord) -> Self {
        NodePathRef::Node(node)
    }
}

/// Resolution scope for node lookups and changes
pub struct Context {
    repository: ContentRepository,
    workspace_name: String,
    workspace: Option<Arc<Workspace>>,
    current_node: Option<NodeRecord>,
    current_date_time: DateTime<Utc>,
    dimensions: DimensionRequest,
    target_dimensions: BTreeMap<String, String>,
    invisible_content_shown: bool,
    removed_content_shown: bool,
    inaccessible_content_shown: bool,
}

impl Context {
    pub fn new(repository: ContentRepository, properties: ContextProperties) -> Self {
        let config = repository.config();
        let dimensions = properties
            .dimensions
            .unwrap_or_else(|| config.default_dimension_request());
        let target_dimensions = properties
            .target_dimensions
            .unwrap_or_else(|| config.default_target_dimensions());

        Self {
            workspace_name: properties.workspace_name,
            workspace: None,
            current_node: None,
            current_date_time: properties.current_date_time.unwrap_or_else(Utc::now),
            dimensions,
            target_dimensions,
            invisible_content_shown: properties.invisible_content_shown,
            removed_content_shown: properties.removed_content_shown,
            inaccessible_content_shown: properties.inaccessible_content_shown,
            repository,
        }
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    pub fn current_date_time(&self) -> DateTime<Utc> {
        self.current_date_time
    }

    /// Override the simulated current time
    pub fn set_current_date_time(&mut self, now: DateTime<Utc>) {
        self.current_date_time = now;
    }

    /// Requested dimension values in fallback order
    pub fn dimensions(&self) -> &DimensionRequest {
        &self.dimensions
    }

    pub fn target_dimensions(&self) -> &BTreeMap<String, String> {
        &self.target_dimensions
    }

    /// Target values as the dimension values of new records
    pub fn target_dimension_values(&self) -> DimensionValues {
        self.target_dimensions
            .iter()
            .map(|(name, value)| (name.clone(), [value.clone()]))
            .collect()
    }

    pub fn is_invisible_content_shown(&self) -> bool {
        self.invisible_content_shown
    }

    pub fn is_removed_content_shown(&self) -> bool {
        self.removed_content_shown
    }

    pub fn is_inaccessible_content_shown(&self) -> bool {
        self.inaccessible_content_shown
    }

    pub fn current_node(&self) -> Option<&NodeRecord> {
        self.current_node.as_ref()
    }

    pub fn set_current_node(&mut self, node: Option<NodeRecord>) {
        self.current_node = node;
    }

    pub fn repository(&self) -> &ContentRepository {
        &self.repository
    }

    /// Workspace of this context
    ///
    /// With `create_if_missing`, a missing workspace is created on top of the
    /// live workspace (which is created first if needed). The result is
    /// memoized.
    pub async fn get_workspace(&mut self, create_if_missing: bool) -> Result<Option<Arc<Workspace>>> {
        if let Some(workspace) = &self.workspace {
            return Ok(Some(workspace.clone()));
        }

        let workspaces = self.repository.workspace_service();
        let workspace = match workspaces.get_workspace(&self.workspace_name).await? {
            Some(workspace) => workspace,
            None if !create_if_missing => return Ok(None),
            None => {
                let live = workspaces.live_workspace().await?;
                if live.name() == self.workspace_name {
                    live
                } else {
                    match workspaces
                        .create_workspace(&self.workspace_name, Some(live))
                        .await
                    {
                        Ok(workspace) => workspace,
                        Err(ContentRepositoryError::WorkspaceExists(_)) => workspaces
                            .get_workspace(&self.workspace_name)
                            .await?
                            .ok_or_else(|| {
                                ContentRepositoryError::workspace_not_found(&self.workspace_name)
                            })?,
                        Err(err) => return Err(err),
                    }
                }
            }
        };

        self.workspace = Some(workspace.clone());
        Ok(Some(workspace))
    }

    async fn require_workspace(&mut self) -> Result<Arc<Workspace>> {
        self.get_workspace(true)
            .await?
            .ok_or_else(|| ContentRepositoryError::workspace_not_found(&self.workspace_name))
    }

    /// Root record as seen from this context's workspace
    pub async fn get_root_node(&mut self) -> Result<NodeRecord> {
        let workspace = self.require_workspace().await?;
        self.repository
            .node_records()
            .find_one_by_path(ROOT_PATH, &workspace, None)
            .await?
            .ok_or_else(|| ContentRepositoryError::node_not_found(ROOT_PATH))
    }

    /// Node at an absolute path, `None` if missing or filtered
    pub async fn get_node(&mut self, path: &str) -> Result<Option<NodeRecord>> {
        if !path.starts_with('/') {
            return Err(ContentRepositoryError::invalid_argument(format!(
                "\"{}\" is not an absolute path",
                path
            )));
        }
        let path = normalize_path(ROOT_PATH, path)?;
        let workspace = self.require_workspace().await?;
        let node = self
            .repository
            .node_records()
            .find_one_by_path(&path, &workspace, Some(&self.dimensions))
            .await?;
        Ok(node.and_then(|node| self.filter_node(node)))
    }

    /// Node by stable identifier, `None` if missing or filtered
    pub async fn get_node_by_identifier(&mut self, identifier: &str) -> Result<Option<NodeRecord>> {
        let workspace = self.require_workspace().await?;
        let node = self
            .repository
            .node_records()
            .find_one_by_identifier(identifier, &workspace, Some(&self.dimensions))
            .await?;
        Ok(node.and_then(|node| self.filter_node(node)))
    }

    /// Visible children of `node`, optionally of one type (sub types included)
    pub async fn get_child_nodes(
        &mut self,
        node: &NodeRecord,
        node_type_filter: Option<&str>,
    ) -> Result<Vec<NodeRecord>> {
        let workspace = self.require_workspace().await?;
        let node_types = node_type_filter.map(|t| {
            self.repository
                .node_types()
                .type_name_with_sub_types(t)
        });
        let children = self
            .repository
            .node_records()
            .find_by_parent(
                node.path(),
                node_types.as_deref(),
                &workspace,
                Some(&self.dimensions),
            )
            .await?;
        Ok(children
            .into_iter()
            .filter_map(|child| self.filter_node(child))
            .collect())
    }

    /// Visible nodes from `start` down to `end`, both included
    pub async fn get_nodes_on_path(
        &mut self,
        start: NodePathRef<'_>,
        end: NodePathRef<'_>,
    ) -> Result<Vec<NodeRecord>> {
        let workspace = self.require_workspace().await?;
        let nodes = self
            .repository
            .node_records()
            .find_on_path(start.path(), end.path(), &workspace, Some(&self.dimensions))
            .await?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| self.filter_node(node))
            .collect())
    }

    /// Apply the visibility toggles to one record
    pub fn filter_node(&self, node: NodeRecord) -> Option<NodeRecord> {
        if node.is_removed() && !self.removed_content_shown {
            return None;
        }
        if !node.is_visible_at(self.current_date_time) && !self.invisible_content_shown {
            return None;
        }
        if !self.inaccessible_content_shown && !node.is_accessible(self.repository.security().as_ref()) {
            return None;
        }
        Some(node)
    }

    /// Record to change `node` through this context
    ///
    /// Returns `node` itself if it already belongs to this context's workspace
    /// and target dimensions; otherwise an existing or new copy there.
    pub async fn adopt_node(&mut self, node: &NodeRecord) -> Result<NodeRecord> {
        let workspace = self.require_workspace().await?;
        let adopted = self
            .repository
            .node_service()
            .materialize(node, &workspace, &self.dimensions, &self.target_dimensions)
            .await?;
        if adopted.persistence_id() != node.persistence_id() {
            debug!(
                "Adopted {} from {} into {}",
                node.path(),
                node.workspace_name(),
                workspace.name()
            );
        }
        Ok(adopted)
    }

    /// Create a child of `parent` in this context's workspace and target dimensions
    pub async fn create_node(
        &mut self,
        parent: &NodeRecord,
        name: &str,
        node_type: Option<&str>,
    ) -> Result<NodeRecord> {
        let workspace = self.require_workspace().await?;
        let mut options = CreateNodeOptions::new()
            .workspace(workspace)
            .dimensions(self.target_dimension_values());
        if let Some(node_type) = node_type {
            options = options.node_type(node_type);
        }
        self.repository
            .node_service()
            .create_node(parent, name, options)
            .await
    }

    /// Remove `node` as seen from this context
    pub async fn remove_node(&mut self, node: &NodeRecord) -> Result<()> {
        let adopted = self.adopt_node(node).await?;
        self.repository.node_service().remove(&adopted).await
    }

    /// Compact cursor: workspace name followed by the current node's path
    ///
    /// Fails if no current node is set.
    pub fn context_path(&self) -> Result<String> {
        let node = self.current_node.as_ref().ok_or_else(|| {
            ContentRepositoryError::invalid_argument("context has no current node")
        })?;
        Ok(format!("{}{}", self.workspace_name, node.path()))
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

//! Workspace Service
//!
//! Creates workspaces together with their root record and publishes the
//! records of a workspace into one of its base workspaces.
//!
//! # Publishing
//!
//! For every published record (except the root):
//!
//! 1. Variants of the same node in the target workspace whose dimensions match
//!    the record's are deleted (the published record replaces them).
//! 2. A live record is moved into the target workspace; a removed record is
//!    deleted, so a removal never reaches the target as a tombstone.
//!
//! All operations of one publish call run as one atomic batch.

use crate::config::ContentRepositoryConfig;
use crate::db::{DomainEvent, NodeRecordRepository, StoreOperation, WorkspaceRepository};
use crate::models::{DimensionRequest, NodeRecord, Workspace};
use crate::services::ContentRepositoryError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, ContentRepositoryError>;

/// Workspace creation and publishing
#[derive(Clone)]
pub struct WorkspaceService {
    repository: Arc<dyn NodeRecordRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    config: Arc<ContentRepositoryConfig>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl WorkspaceService {
    pub fn new(
        repository: Arc<dyn NodeRecordRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        config: Arc<ContentRepositoryConfig>,
        event_tx: broadcast::Sender<DomainEvent>,
    ) -> Self {
        Self {
            repository,
            workspaces,
            config,
            event_tx,
        }
    }

    fn emit_event(&self, event: DomainEvent) {
        let _ = self.event_tx.send(event);
    }

    pub async fn get_workspace(&self, name: &str) -> Result<Option<Arc<Workspace>>> {
        Ok(self.workspaces.find_one_by_name(name).await?)
    }

    /// Create a workspace and its root record
    ///
    /// The base workspace is fixed for the lifetime of the workspace.
    pub async fn create_workspace(
        &self,
        name: &str,
        base_workspace: Option<Arc<Workspace>>,
    ) -> Result<Arc<Workspace>> {
        if name.is_empty() {
            return Err(ContentRepositoryError::invalid_argument(
                "workspace name must not be empty",
            ));
        }

        let root = NodeRecord::new_root(name);
        let base_name = base_workspace.as_ref().map(|base| base.name().to_string());
        let workspace = self
            .workspaces
            .add(Workspace::new(name, base_workspace, root.identifier()))
            .await?;
        self.repository.add(root).await?;

        info!(
            "Created workspace {} (base: {})",
            name,
            base_name.as_deref().unwrap_or("none")
        );
        self.emit_event(DomainEvent::WorkspaceCreated {
            name: name.to_string(),
            base_workspace: base_name,
        });
        Ok(workspace)
    }

    /// The configured live workspace, created if missing
    pub async fn live_workspace(&self) -> Result<Arc<Workspace>> {
        let live_name = self.config.live_workspace_name.as_str();
        if let Some(live) = self.get_workspace(live_name).await? {
            return Ok(live);
        }
        match self.create_workspace(live_name, None).await {
            Ok(live) => Ok(live),
            // Created concurrently
            Err(ContentRepositoryError::WorkspaceExists(_)) => self
                .get_workspace(live_name)
                .await?
                .ok_or_else(|| ContentRepositoryError::workspace_not_found(live_name)),
            Err(err) => Err(err),
        }
    }

    /// Number of records owned by the workspace, the root included
    pub async fn get_node_count(&self, workspace: &Workspace) -> Result<usize> {
        Ok(self.repository.find_by_workspace(workspace.name()).await?.len())
    }

    /// Publish every record of `workspace` into `target_workspace_name`
    ///
    /// Returns the number of published records.
    pub async fn publish(&self, workspace: &Workspace, target_workspace_name: &str) -> Result<usize> {
        let records = self.repository.find_by_workspace(workspace.name()).await?;
        self.publish_nodes(workspace, records, target_workspace_name)
            .await
    }

    /// Publish the given records of `workspace` into `target_workspace_name`
    ///
    /// The target must be reachable through the base workspace chain,
    /// otherwise this fails with `NotABaseWorkspace`. Records carrying a stale
    /// version fail the whole call with `ConcurrentModification`.
    pub async fn publish_nodes(
        &self,
        workspace: &Workspace,
        records: Vec<NodeRecord>,
        target_workspace_name: &str,
    ) -> Result<usize> {
        let target = workspace
            .publishing_target(target_workspace_name)
            .cloned()
            .ok_or_else(|| {
                ContentRepositoryError::not_a_base_workspace(workspace.name(), target_workspace_name)
            })?;

        let mut operations = Vec::new();
        let mut replaced = HashSet::new();
        let mut published = 0;

        for record in records {
            if record.is_root() {
                continue;
            }
            if record.workspace_name() != workspace.name() {
                return Err(ContentRepositoryError::invalid_argument(format!(
                    "record {} belongs to workspace {}, not {}",
                    record.path(),
                    record.workspace_name(),
                    workspace.name()
                )));
            }

            let request = DimensionRequest::from(record.dimensions());
            let existing = self
                .repository
                .find_variants_by_identifier(record.identifier(), &target)
                .await?;
            for variant in existing {
                if variant.workspace_name() == target.name()
                    && variant.dimensions().matches(&request)
                    && replaced.insert(variant.persistence_id())
                {
                    operations.push(StoreOperation::Remove(variant));
                }
            }

            if record.is_removed() {
                operations.push(StoreOperation::Remove(record));
            } else {
                let mut moved = record;
                moved.set_workspace_name(target.name());
                moved.touch();
                operations.push(StoreOperation::Update(moved));
            }
            published += 1;
        }

        let removed: Vec<NodeRecord> = operations
            .iter()
            .filter_map(|op| match op {
                StoreOperation::Remove(record) => Some(record.clone()),
                _ => None,
            })
            .collect();

        let stored = self.repository.apply_batch(operations).await?;
        debug!(
            "Publish {} -> {}: {} moved, {} deleted",
            workspace.name(),
            target.name(),
            stored.len(),
            removed.len()
        );

        for record in removed {
            self.emit_event(DomainEvent::NodeRemoved {
                identifier: record.identifier().to_string(),
                path: record.path().to_string(),
                workspace: record.workspace_name().to_string(),
            });
        }
        for record in stored {
            self.emit_event(DomainEvent::NodeUpdated(record));
        }

        info!(
            "Published {} records from {} to {}",
            published,
            workspace.name(),
            target.name()
        );
        self.emit_event(DomainEvent::NodesPublished {
            source_workspace: workspace.name().to_string(),
            target_workspace: target.name().to_string(),
            count: published,
        });
        Ok(published)
    }
}

#[cfg(test)]
#[path = "workspace_service_test.rs"]
mod workspace_service_test;

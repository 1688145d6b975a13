//! Node Record Service
//!
//! Repository-backed operations on [`NodeRecord`] values: child creation,
//! relative lookups, path renames, removal and persistence of changes.
//!
//! # Cascades
//!
//! Renames and removals touch a node together with all of its descendants.
//! Each cascade is collected into one batch of [`StoreOperation`]s and applied
//! atomically, so no partial cascade is ever visible. Cascades larger than
//! `cascadeLimit` are rejected before anything is written.
//!
//! In a workspace with a base workspace, descendants that only exist in a base
//! workspace are shadowed by new records in the node's workspace: moved copies
//! for a rename, tombstones for a removal.

use crate::config::ContentRepositoryConfig;
use crate::db::{
    DomainEvent, IndexPosition, NodeRecordRepository, StoreOperation, WorkspaceRepository,
};
use crate::models::path::{self, child_path, is_descendant_of, normalize_path, validate_node_name};
use crate::models::{
    DimensionRequest, DimensionValues, NodeRecord, NodeTemplate, SimilarizeSource, Workspace,
};
use crate::services::{ContentRepositoryError, NodeTypeManager};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

type Result<T> = std::result::Result<T, ContentRepositoryError>;

/// Optional arguments of [`NodeRecordService::create_node`]
///
/// Without a workspace the parent's workspace is used; without dimensions the
/// node is created without dimension values.
#[derive(Debug, Clone, Default)]
pub struct CreateNodeOptions {
    pub node_type: Option<String>,
    pub identifier: Option<String>,
    pub workspace: Option<Arc<Workspace>>,
    pub dimensions: Option<DimensionValues>,
}

impl CreateNodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn workspace(mut self, workspace: Arc<Workspace>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn dimensions(mut self, dimensions: DimensionValues) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Node record operations
#[derive(Clone)]
pub struct NodeRecordService {
    repository: Arc<dyn NodeRecordRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    node_types: Arc<dyn NodeTypeManager>,
    config: Arc<ContentRepositoryConfig>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl NodeRecordService {
    pub fn new(
        repository: Arc<dyn NodeRecordRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        node_types: Arc<dyn NodeTypeManager>,
        config: Arc<ContentRepositoryConfig>,
        event_tx: broadcast::Sender<DomainEvent>,
    ) -> Self {
        Self {
            repository,
            workspaces,
            node_types,
            config,
            event_tx,
        }
    }

    pub fn repository(&self) -> &Arc<dyn NodeRecordRepository> {
        &self.repository
    }

    /// Subscribe to domain events
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Emit a domain event to all subscribers
    ///
    /// Ignores errors if there are no subscribers.
    fn emit_event(&self, event: DomainEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Workspace owning `record`
    pub async fn workspace_of(&self, record: &NodeRecord) -> Result<Arc<Workspace>> {
        self.workspaces
            .find_one_by_name(record.workspace_name())
            .await?
            .ok_or_else(|| ContentRepositoryError::workspace_not_found(record.workspace_name()))
    }

    fn validate_path(&self, path: &str) -> Result<()> {
        Ok(path::validate_path(path, self.config.max_path_length)?)
    }

    //
    // LOOKUPS
    //

    /// Resolve `relative_path` against `record` in the record's workspace
    ///
    /// Returns `None` for missing and removed nodes.
    pub async fn get_node(
        &self,
        record: &NodeRecord,
        relative_path: &str,
    ) -> Result<Option<NodeRecord>> {
        let path = normalize_path(record.path(), relative_path)?;
        self.validate_path(&path)?;
        let workspace = self.workspace_of(record).await?;
        Ok(self
            .repository
            .find_one_by_path(&path, &workspace, None)
            .await?
            .filter(|node| !node.is_removed()))
    }

    /// Parent of `record`; `None` for the root
    pub async fn get_parent(&self, record: &NodeRecord) -> Result<Option<NodeRecord>> {
        if record.is_root() {
            return Ok(None);
        }
        let workspace = self.workspace_of(record).await?;
        Ok(self
            .repository
            .find_one_by_path(record.parent_path(), &workspace, None)
            .await?)
    }

    /// Every stored variant of every child, across dimensions and the base chain
    pub async fn get_child_node_data(&self, record: &NodeRecord) -> Result<Vec<NodeRecord>> {
        let workspace = self.workspace_of(record).await?;
        Ok(self
            .repository
            .find_by_parent_without_reduce(record.path(), &workspace)
            .await?)
    }

    /// Number of children a reduced child lookup would return
    pub async fn get_number_of_child_nodes(
        &self,
        record: &NodeRecord,
        node_type_filter: Option<&str>,
        workspace: &Workspace,
        dimensions: &DimensionRequest,
    ) -> Result<usize> {
        let node_types = node_type_filter.map(|t| self.node_types.type_name_with_sub_types(t));
        Ok(self
            .repository
            .count_by_parent_and_type(
                record.path(),
                node_types.as_deref(),
                workspace,
                Some(dimensions),
            )
            .await?)
    }

    //
    // CREATION
    //

    /// Create a child node, apply type defaults and create auto-created children
    ///
    /// Auto-created children are created depth-first with the same workspace
    /// and dimensions as the new node.
    pub async fn create_node(
        &self,
        parent: &NodeRecord,
        name: &str,
        options: CreateNodeOptions,
    ) -> Result<NodeRecord> {
        let node_type = match &options.node_type {
            Some(type_name) => {
                let node_type = self
                    .node_types
                    .get_node_type(type_name)
                    .ok_or_else(|| ContentRepositoryError::NodeTypeNotFound(type_name.clone()))?;
                if node_type.is_abstract() {
                    return Err(ContentRepositoryError::invalid_argument(format!(
                        "node type \"{}\" is abstract",
                        type_name
                    )));
                }
                Some(node_type)
            }
            None => None,
        };

        let mut node = self.create_single_node(parent, name, &options).await?;

        if let Some(node_type) = node_type {
            let defaults = node_type.get_default_values_for_properties();
            if !defaults.is_empty() {
                for (property, value) in defaults {
                    node.set_property(property, value.clone());
                }
                node = self.persist(node).await?;
            }

            for (child_name, child_type) in node_type.get_auto_created_child_nodes() {
                let child_options = CreateNodeOptions {
                    node_type: Some(child_type.clone()),
                    identifier: None,
                    workspace: options.workspace.clone(),
                    dimensions: options.dimensions.clone(),
                };
                // Recursive call, boxed to keep the future size finite
                Box::pin(self.create_node(&node, child_name, child_options)).await?;
            }
        }

        Ok(node)
    }

    /// Create and store one child node without defaults or auto-created children
    ///
    /// The new node gets the last sibling index.
    pub async fn create_single_node(
        &self,
        parent: &NodeRecord,
        name: &str,
        options: &CreateNodeOptions,
    ) -> Result<NodeRecord> {
        validate_node_name(name)?;

        let workspace = match &options.workspace {
            Some(workspace) => workspace.clone(),
            None => self.workspace_of(parent).await?,
        };
        let new_path = child_path(parent.path(), name);
        self.validate_path(&new_path)?;

        let dimensions = options.dimensions.clone().unwrap_or_default();
        if self
            .find_collision(&new_path, &workspace, &dimensions)
            .await?
            .is_some()
        {
            return Err(ContentRepositoryError::node_already_exists(
                new_path,
                workspace.name(),
            ));
        }

        let mut node = NodeRecord::new(
            &new_path,
            workspace.name(),
            options.identifier.clone(),
            Some(dimensions),
        )?;
        if let Some(node_type) = &options.node_type {
            node.node_type = node_type.clone();
        }
        let index = self
            .repository
            .next_index(parent.path(), &workspace, IndexPosition::Last)
            .await?;
        node.set_index_value(Some(index));

        let stored = self.repository.add(node).await?;
        debug!(
            "Created node {} at {} in workspace {}",
            stored.identifier(),
            stored.path(),
            stored.workspace_name()
        );
        self.emit_event(DomainEvent::NodeAdded(stored.clone()));
        Ok(stored)
    }

    /// Create a child node from a template
    ///
    /// The name defaults to the template's name (or a generated one). On
    /// collision `-1`, `-2`, ... is appended until the name is free.
    pub async fn create_node_from_template(
        &self,
        parent: &NodeRecord,
        template: &NodeTemplate,
        name: Option<&str>,
        workspace: Option<Arc<Workspace>>,
        dimensions: Option<DimensionValues>,
    ) -> Result<NodeRecord> {
        let base_name = name
            .map(str::to_string)
            .or_else(|| template.name.clone())
            .unwrap_or_else(|| format!("node-{}", Uuid::new_v4().simple()));

        let target_workspace = match &workspace {
            Some(workspace) => workspace.clone(),
            None => self.workspace_of(parent).await?,
        };
        let target_dimensions = dimensions.clone().unwrap_or_default();

        let mut candidate = base_name.clone();
        let mut counter = 1;
        while self
            .find_collision(
                &child_path(parent.path(), &candidate),
                &target_workspace,
                &target_dimensions,
            )
            .await?
            .is_some()
        {
            candidate = format!("{}-{}", base_name, counter);
            counter += 1;
        }

        let options = CreateNodeOptions {
            node_type: Some(template.node_type.clone()),
            identifier: template.identifier.clone(),
            workspace: Some(target_workspace),
            dimensions,
        };
        let mut node = self.create_node(parent, &candidate, options).await?;
        node.similarize(SimilarizeSource::Template(template));
        self.persist(node).await
    }

    /// Existing record (tombstones included) occupying `path` for `dimensions`
    async fn find_collision(
        &self,
        path: &str,
        workspace: &Workspace,
        dimensions: &DimensionValues,
    ) -> Result<Option<NodeRecord>> {
        let request = DimensionRequest::from(dimensions);
        Ok(self
            .repository
            .find_one_by_path(path, workspace, Some(&request))
            .await?)
    }

    //
    // MUTATION
    //

    /// Persist a changed record
    ///
    /// Fails with `ConcurrentModification` if the record was changed since it
    /// was read.
    pub async fn persist(&self, mut record: NodeRecord) -> Result<NodeRecord> {
        record.touch();
        let stored = self.repository.update(record).await?;
        self.emit_event(DomainEvent::NodeUpdated(stored.clone()));
        Ok(stored)
    }

    /// Change the sibling index
    pub async fn set_index(&self, record: &NodeRecord, index: i64) -> Result<NodeRecord> {
        let mut changed = record.clone();
        changed.set_index_value(Some(index));
        self.persist(changed).await
    }

    /// Flag a record as removed (cascading like [`remove`](Self::remove)) or restore it
    pub async fn set_removed(&self, record: &NodeRecord, removed: bool) -> Result<()> {
        if removed {
            return self.remove(record).await;
        }
        if record.is_removed() {
            let mut restored = record.clone();
            restored.set_removed_flag(false);
            self.persist(restored).await?;
        }
        Ok(())
    }

    /// Move `record` to `new_path`
    ///
    /// With `recursive`, all descendants move along. Fails with `InvalidPath`
    /// for invalid targets and with `NodeAlreadyExists` if another node is
    /// visible at `new_path`. Emits one `NodePathChanged` per moved record.
    pub async fn set_path(
        &self,
        record: &NodeRecord,
        new_path: &str,
        recursive: bool,
    ) -> Result<NodeRecord> {
        self.validate_path(new_path)?;
        if record.path() == new_path {
            return Ok(record.clone());
        }
        if record.is_root() {
            return Err(ContentRepositoryError::invalid_argument(
                "the root node cannot be moved",
            ));
        }
        if is_descendant_of(new_path, record.path()) {
            return Err(ContentRepositoryError::invalid_path(
                new_path,
                "a node cannot be moved below itself",
            ));
        }

        let workspace = self.workspace_of(record).await?;
        let request = DimensionRequest::from(record.dimensions());
        if let Some(existing) = self
            .repository
            .find_one_by_path(new_path, &workspace, Some(&request))
            .await?
        {
            if existing.identifier() != record.identifier() {
                return Err(ContentRepositoryError::node_already_exists(
                    new_path,
                    workspace.name(),
                ));
            }
        }

        let old_path = record.path().to_string();
        let mut moved = record.clone();
        moved.apply_path(new_path);
        moved.touch();
        let mut operations = vec![StoreOperation::Update(moved)];

        if recursive {
            let descendants = self
                .repository
                .find_descendants_without_reduce(&old_path, &workspace)
                .await?;
            for nearest in self
                .nearest_variants(&descendants, &old_path, &workspace)
                .await?
            {
                let spliced = format!("{}{}", new_path, &nearest.path()[old_path.len()..]);
                self.validate_path(&spliced)?;

                if nearest.workspace_name() == workspace.name() {
                    let mut own = nearest;
                    own.apply_path(&spliced);
                    own.touch();
                    operations.push(StoreOperation::Update(own));
                } else if !nearest.is_removed() {
                    let mut copy = nearest.copy_for_workspace(workspace.name());
                    copy.apply_path(&spliced);
                    operations.push(StoreOperation::Add(copy));
                }
            }
        }

        self.check_cascade(&old_path, operations.len())?;

        let old_paths: HashMap<Uuid, String> = operations
            .iter()
            .map(|op| {
                let record = op.record();
                let old = format!("{}{}", old_path, &record.path()[new_path.len()..]);
                (record.persistence_id(), old)
            })
            .collect();

        let stored = self.repository.apply_batch(operations).await?;
        debug!(
            "Moved {} to {} ({} records) in workspace {}",
            old_path,
            new_path,
            stored.len(),
            workspace.name()
        );

        for record in &stored {
            if let Some(old) = old_paths.get(&record.persistence_id()) {
                self.emit_event(DomainEvent::NodePathChanged {
                    identifier: record.identifier().to_string(),
                    workspace: record.workspace_name().to_string(),
                    old_path: old.clone(),
                    new_path: record.path().to_string(),
                });
            }
        }

        stored
            .into_iter()
            .next()
            .ok_or_else(|| ContentRepositoryError::node_not_found(new_path))
    }

    /// Remove `record` and all its descendants
    ///
    /// In a workspace without base workspace the records are deleted. In a
    /// branch they are flagged as removed, and descendants that only exist in
    /// base workspaces get tombstones in the branch.
    pub async fn remove(&self, record: &NodeRecord) -> Result<()> {
        if record.is_root() {
            return Err(ContentRepositoryError::invalid_argument(
                "the root node cannot be removed",
            ));
        }

        let workspace = self.workspace_of(record).await?;
        let descendants = self
            .repository
            .find_descendants_without_reduce(record.path(), &workspace)
            .await?;

        let mut operations = Vec::with_capacity(descendants.len() + 1);
        if !workspace.has_base_workspace() {
            // Deepest first, the node itself last
            operations.extend(descendants.into_iter().rev().map(StoreOperation::Remove));
            operations.push(StoreOperation::Remove(record.clone()));
        } else {
            let nearest = self
                .nearest_variants(&descendants, record.path(), &workspace)
                .await?;
            for variant in nearest.into_iter().rev() {
                if variant.is_removed() {
                    continue;
                }
                if variant.workspace_name() == workspace.name() {
                    let mut tombstone = variant;
                    tombstone.set_removed_flag(true);
                    tombstone.touch();
                    operations.push(StoreOperation::Update(tombstone));
                } else {
                    let mut tombstone = variant.copy_for_workspace(workspace.name());
                    tombstone.set_removed_flag(true);
                    operations.push(StoreOperation::Add(tombstone));
                }
            }
            if !record.is_removed() {
                let mut tombstone = record.clone();
                tombstone.set_removed_flag(true);
                tombstone.touch();
                operations.push(StoreOperation::Update(tombstone));
            }
        }

        self.check_cascade(record.path(), operations.len())?;

        let removed: Vec<NodeRecord> = operations
            .iter()
            .filter_map(|op| match op {
                StoreOperation::Remove(record) => Some(record.clone()),
                _ => None,
            })
            .collect();

        let stored = self.repository.apply_batch(operations).await?;
        debug!(
            "Removed {} in workspace {} ({} deleted, {} flagged)",
            record.path(),
            workspace.name(),
            removed.len(),
            stored.len()
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
        Ok(())
    }

    /// Copy `record` into `workspace` with the given target dimensions
    ///
    /// Returns an existing variant of the same node in that workspace and
    /// dimensions if there is one, otherwise stores a new similar copy.
    pub async fn materialize(
        &self,
        record: &NodeRecord,
        workspace: &Workspace,
        declared_dimensions: &DimensionRequest,
        target_dimensions: &BTreeMap<String, String>,
    ) -> Result<NodeRecord> {
        let mut copy = record.copy_for_workspace(workspace.name());
        copy.adjust_to_context(workspace.name(), declared_dimensions, target_dimensions)?;

        if record.workspace_name() == workspace.name()
            && record.dimensions_hash() == copy.dimensions_hash()
        {
            return Ok(record.clone());
        }

        let existing = self
            .repository
            .find_variants_by_identifier(record.identifier(), workspace)
            .await?
            .into_iter()
            .find(|variant| {
                variant.workspace_name() == workspace.name()
                    && variant.dimensions_hash() == copy.dimensions_hash()
            });
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let stored = self.repository.add(copy).await?;
        debug!(
            "Materialized node {} at {} in workspace {}",
            stored.identifier(),
            stored.path(),
            stored.workspace_name()
        );
        self.emit_event(DomainEvent::NodeAdded(stored.clone()));
        Ok(stored)
    }

    /// Nearest variant per (identifier, dimensions) among `descendants`
    ///
    /// Variants whose nearest copy lives outside `ancestor_path` are dropped.
    /// The result keeps the depth order of `descendants`.
    async fn nearest_variants(
        &self,
        descendants: &[NodeRecord],
        ancestor_path: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>> {
        let mut seen = BTreeSet::new();
        let mut variants_by_identifier: HashMap<String, Vec<NodeRecord>> = HashMap::new();
        let mut nearest = Vec::new();

        for descendant in descendants {
            let key = (
                descendant.identifier().to_string(),
                descendant.dimensions_hash().to_string(),
            );
            if !seen.insert(key) {
                continue;
            }

            if !variants_by_identifier.contains_key(descendant.identifier()) {
                let variants = self
                    .repository
                    .find_variants_by_identifier(descendant.identifier(), workspace)
                    .await?;
                variants_by_identifier.insert(descendant.identifier().to_string(), variants);
            }

            let winner = variants_by_identifier
                .get(descendant.identifier())
                .and_then(|variants| {
                    variants
                        .iter()
                        .find(|v| v.dimensions_hash() == descendant.dimensions_hash())
                });
            if let Some(winner) = winner {
                if is_descendant_of(winner.path(), ancestor_path) {
                    nearest.push(winner.clone());
                }
            }
        }

        Ok(nearest)
    }

    fn check_cascade(&self, path: &str, count: usize) -> Result<()> {
        if count > self.config.cascade_limit {
            return Err(ContentRepositoryError::CascadeLimitExceeded {
                path: path.to_string(),
                count,
                limit: self.config.cascade_limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "node_record_service_test.rs"]
mod node_record_service_test;

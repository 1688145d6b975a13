//! In-Memory Repository Backend
//!
//! Reference implementation of [`NodeRecordRepository`] and
//! [`WorkspaceRepository`] keeping all state behind a tokio `RwLock`.
//!
//! Records are indexed by path, parent path and identifier. Batches are
//! applied in place with an undo log and rolled back if any operation or the
//! final uniqueness check fails, so readers never observe a partial batch.

use crate::db::{NodeRecordRepository, RepositoryError, StoreOperation, WorkspaceRepository};
use crate::models::path::is_descendant_of;
use crate::models::{DimensionRequest, NodeRecord, Workspace};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Overlay rank of a variant: workspace distance, then dimension fallback rank
type Rank = (usize, Vec<usize>);

#[derive(Default)]
struct StoreState {
    records: HashMap<Uuid, NodeRecord>,
    by_path: HashMap<String, BTreeSet<Uuid>>,
    by_parent: HashMap<String, BTreeSet<Uuid>>,
    by_identifier: HashMap<String, BTreeSet<Uuid>>,
}

enum Undo {
    Inserted(Uuid),
    Replaced(NodeRecord),
    Removed(NodeRecord),
}

impl StoreState {
    fn insert(&mut self, record: NodeRecord) {
        let id = record.persistence_id();
        self.by_path
            .entry(record.path().to_string())
            .or_default()
            .insert(id);
        self.by_parent
            .entry(record.parent_path().to_string())
            .or_default()
            .insert(id);
        self.by_identifier
            .entry(record.identifier().to_string())
            .or_default()
            .insert(id);
        self.records.insert(id, record);
    }

    fn delete(&mut self, id: Uuid) -> Option<NodeRecord> {
        let record = self.records.remove(&id)?;
        unindex(&mut self.by_path, record.path(), id);
        unindex(&mut self.by_parent, record.parent_path(), id);
        unindex(&mut self.by_identifier, record.identifier(), id);
        Some(record)
    }

    fn lookup<'a>(
        &'a self,
        index: &'a HashMap<String, BTreeSet<Uuid>>,
        key: &str,
    ) -> impl Iterator<Item = &'a NodeRecord> + 'a {
        index
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
    }

    fn check_version(&self, record: &NodeRecord) -> Result<&NodeRecord, RepositoryError> {
        let stored = self
            .records
            .get(&record.persistence_id())
            .ok_or_else(|| RepositoryError::not_found(record.persistence_id().to_string()))?;
        if stored.version() != record.version() {
            return Err(RepositoryError::version_conflict(
                record.persistence_id(),
                record.version(),
                stored.version(),
            ));
        }
        Ok(stored)
    }

    fn apply(
        &mut self,
        operation: StoreOperation,
        undo: &mut Vec<Undo>,
    ) -> Result<Option<NodeRecord>, RepositoryError> {
        match operation {
            StoreOperation::Add(mut record) => {
                let id = record.persistence_id();
                if self.records.contains_key(&id) {
                    return Err(RepositoryError::duplicate_key(
                        format!("persistence id {}", id),
                        record.workspace_name(),
                    ));
                }
                record.set_version(1);
                self.insert(record.clone());
                undo.push(Undo::Inserted(id));
                Ok(Some(record))
            }
            StoreOperation::Update(mut record) => {
                self.check_version(&record)?;
                let previous = self.delete(record.persistence_id());
                record.set_version(record.version() + 1);
                self.insert(record.clone());
                if let Some(previous) = previous {
                    undo.push(Undo::Replaced(previous));
                }
                Ok(Some(record))
            }
            StoreOperation::Remove(record) => {
                self.check_version(&record)?;
                if let Some(previous) = self.delete(record.persistence_id()) {
                    undo.push(Undo::Removed(previous));
                }
                Ok(None)
            }
        }
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Inserted(id) => {
                    self.delete(id);
                }
                Undo::Replaced(previous) => {
                    self.delete(previous.persistence_id());
                    self.insert(previous);
                }
                Undo::Removed(previous) => self.insert(previous),
            }
        }
    }

    /// Verify both uniqueness keys for the given records
    fn check_unique(&self, touched: &[Uuid]) -> Result<(), RepositoryError> {
        for id in touched {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            let same_scope = |other: &&NodeRecord| {
                other.persistence_id() != *id
                    && other.workspace_name() == record.workspace_name()
                    && other.dimensions_hash() == record.dimensions_hash()
            };

            if self.lookup(&self.by_path, record.path()).any(|o| same_scope(&o)) {
                return Err(RepositoryError::duplicate_key(
                    record.path(),
                    record.workspace_name(),
                ));
            }
            if self
                .lookup(&self.by_identifier, record.identifier())
                .any(|o| same_scope(&o))
            {
                return Err(RepositoryError::duplicate_key(
                    format!("identifier {}", record.identifier()),
                    record.workspace_name(),
                ));
            }
        }
        Ok(())
    }

    /// Winning variant of one node for a workspace chain and request
    ///
    /// With `variant` set, only records with that dimensions hash compete.
    fn winner(
        &self,
        identifier: &str,
        variant: Option<&str>,
        chain: &[String],
        dimensions: Option<&DimensionRequest>,
    ) -> Option<&NodeRecord> {
        self.lookup(&self.by_identifier, identifier)
            .filter(|record| variant.map_or(true, |hash| record.dimensions_hash() == hash))
            .filter_map(|record| rank(record, chain, dimensions).map(|r| (r, record)))
            .min_by(|(a, ra), (b, rb)| compare(a, ra, b, rb))
            .map(|(_, record)| record)
    }

    /// Reduce candidates to their winners, keeping winners accepted by `keep`
    ///
    /// Yields at most one record per identifier. Without a dimension request
    /// every dimension variant is reduced on its own first, so a variant that
    /// moved away does not hide its siblings still stored at the old path.
    fn reduce<'a>(
        &'a self,
        candidates: impl Iterator<Item = &'a NodeRecord>,
        chain: &[String],
        dimensions: Option<&DimensionRequest>,
        keep: impl Fn(&NodeRecord) -> bool,
    ) -> Vec<(Rank, &'a NodeRecord)> {
        let per_variant = dimensions.map_or(true, DimensionRequest::is_empty);
        let keys: BTreeSet<(&str, Option<&str>)> = candidates
            .filter(|record| rank(record, chain, dimensions).is_some())
            .map(|record| {
                let variant = per_variant.then(|| record.dimensions_hash());
                (record.identifier(), variant)
            })
            .collect();

        let mut winners: BTreeMap<&str, (Rank, &'a NodeRecord)> = BTreeMap::new();
        for (identifier, variant) in keys {
            let Some(record) = self.winner(identifier, variant, chain, dimensions) else {
                continue;
            };
            if !keep(record) {
                continue;
            }
            let Some(record_rank) = rank(record, chain, dimensions) else {
                continue;
            };
            let better = winners.get(identifier).map_or(true, |(best, best_record)| {
                compare(&record_rank, record, best, best_record) == Ordering::Less
            });
            if better {
                winners.insert(identifier, (record_rank, record));
            }
        }
        winners.into_values().collect()
    }
}

fn unindex(index: &mut HashMap<String, BTreeSet<Uuid>>, key: &str, id: Uuid) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn rank(record: &NodeRecord, chain: &[String], dimensions: Option<&DimensionRequest>) -> Option<Rank> {
    let distance = chain
        .iter()
        .position(|name| name == record.workspace_name())?;
    // The root carries no dimension values and answers every request
    let priority = match dimensions {
        Some(requested) if !record.is_root() => record.dimensions().priority(requested)?,
        _ => Vec::new(),
    };
    Some((distance, priority))
}

fn compare(a: &Rank, ra: &NodeRecord, b: &Rank, rb: &NodeRecord) -> Ordering {
    a.cmp(b)
        .then_with(|| ra.dimensions_hash().cmp(rb.dimensions_hash()))
}

fn by_index(a: &NodeRecord, b: &NodeRecord) -> Ordering {
    // Records without index go last
    match (a.index(), b.index()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.path().cmp(b.path()))
}

fn by_depth(a: &NodeRecord, b: &NodeRecord) -> Ordering {
    a.depth()
        .cmp(&b.depth())
        .then_with(|| a.path().cmp(b.path()))
        .then_with(|| a.dimensions_hash().cmp(b.dimensions_hash()))
}

/// In-memory node record store
#[derive(Default)]
pub struct InMemoryNodeRecordRepository {
    state: RwLock<StoreState>,
}

impl InMemoryNodeRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all workspaces
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl NodeRecordRepository for InMemoryNodeRecordRepository {
    async fn find_one_by_path(
        &self,
        path: &str,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Option<NodeRecord>, RepositoryError> {
        let chain = workspace.workspace_chain();
        let state = self.state.read().await;
        let winners = state.reduce(
            state.lookup(&state.by_path, path),
            &chain,
            dimensions,
            |record| record.path() == path,
        );

        Ok(winners
            .into_iter()
            .min_by(|(a, ra), (b, rb)| compare(a, ra, b, rb))
            .map(|(_, record)| record.clone()))
    }

    async fn find_by_parent(
        &self,
        parent_path: &str,
        node_types: Option<&[String]>,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let chain = workspace.workspace_chain();
        let state = self.state.read().await;
        let winners = state.reduce(
            state.lookup(&state.by_parent, parent_path),
            &chain,
            dimensions,
            |record| {
                record.parent_path() == parent_path
                    && node_types.map_or(true, |types| types.iter().any(|t| *t == record.node_type))
            },
        );

        let mut children: Vec<NodeRecord> =
            winners.into_iter().map(|(_, record)| record.clone()).collect();
        children.sort_by(by_index);
        Ok(children)
    }

    async fn find_one_by_identifier(
        &self,
        identifier: &str,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Option<NodeRecord>, RepositoryError> {
        let chain = workspace.workspace_chain();
        let state = self.state.read().await;
        Ok(state.winner(identifier, None, &chain, dimensions).cloned())
    }

    async fn find_by_parent_without_reduce(
        &self,
        parent_path: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let chain = workspace.workspace_chain();
        let state = self.state.read().await;
        let mut children: Vec<NodeRecord> = state
            .lookup(&state.by_parent, parent_path)
            .filter(|record| chain.iter().any(|name| name == record.workspace_name()))
            .cloned()
            .collect();
        children.sort_by(by_index);
        Ok(children)
    }

    async fn find_descendants_without_reduce(
        &self,
        path: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let chain = workspace.workspace_chain();
        let state = self.state.read().await;
        let mut descendants: Vec<NodeRecord> = state
            .records
            .values()
            .filter(|record| is_descendant_of(record.path(), path))
            .filter(|record| chain.iter().any(|name| name == record.workspace_name()))
            .cloned()
            .collect();
        descendants.sort_by(by_depth);
        Ok(descendants)
    }

    async fn find_variants_by_identifier(
        &self,
        identifier: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let chain = workspace.workspace_chain();
        let state = self.state.read().await;
        let mut variants: Vec<(usize, NodeRecord)> = state
            .lookup(&state.by_identifier, identifier)
            .filter_map(|record| rank(record, &chain, None).map(|(d, _)| (d, record.clone())))
            .collect();
        variants.sort_by(|(da, a), (db, b)| {
            da.cmp(db)
                .then_with(|| a.dimensions_hash().cmp(b.dimensions_hash()))
        });
        Ok(variants.into_iter().map(|(_, record)| record).collect())
    }

    async fn find_by_workspace(
        &self,
        workspace_name: &str,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut records: Vec<NodeRecord> = state
            .records
            .values()
            .filter(|record| record.workspace_name() == workspace_name)
            .cloned()
            .collect();
        records.sort_by(by_depth);
        Ok(records)
    }

    async fn find_by_persistence_id(
        &self,
        persistence_id: Uuid,
    ) -> Result<Option<NodeRecord>, RepositoryError> {
        Ok(self.state.read().await.records.get(&persistence_id).cloned())
    }

    async fn apply_batch(
        &self,
        operations: Vec<StoreOperation>,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        let mut state = self.state.write().await;
        let mut undo = Vec::with_capacity(operations.len());
        let mut touched = Vec::with_capacity(operations.len());
        let mut stored = Vec::new();

        let mut outcome = Ok(());
        for operation in operations {
            let id = operation.record().persistence_id();
            match state.apply(operation, &mut undo) {
                Ok(Some(record)) => {
                    touched.push(id);
                    stored.push(record);
                }
                Ok(None) => {}
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        if outcome.is_ok() {
            outcome = state.check_unique(&touched);
        }

        match outcome {
            Ok(()) => Ok(stored),
            Err(err) => {
                state.rollback(undo);
                Err(err)
            }
        }
    }
}

/// In-memory workspace store
#[derive(Default)]
pub struct InMemoryWorkspaceRepository {
    workspaces: RwLock<HashMap<String, Arc<Workspace>>>,
}

impl InMemoryWorkspaceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceRepository for InMemoryWorkspaceRepository {
    async fn find_one_by_name(&self, name: &str) -> Result<Option<Arc<Workspace>>, RepositoryError> {
        Ok(self.workspaces.read().await.get(name).cloned())
    }

    async fn add(&self, workspace: Workspace) -> Result<Arc<Workspace>, RepositoryError> {
        let mut workspaces = self.workspaces.write().await;
        if workspaces.contains_key(workspace.name()) {
            return Err(RepositoryError::WorkspaceExists(workspace.name().to_string()));
        }
        let workspace = Arc::new(workspace);
        workspaces.insert(workspace.name().to_string(), workspace.clone());
        Ok(workspace)
    }

    async fn find_all(&self) -> Result<Vec<Arc<Workspace>>, RepositoryError> {
        let mut all: Vec<Arc<Workspace>> = self.workspaces.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(all)
    }
}

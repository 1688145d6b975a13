//! NodeRecordRepository Trait - Persistence Abstraction
//!
//! This module defines the seam between the node services and a storage
//! backend. A backend stores [`NodeRecord`] values and answers lookups scoped
//! to a workspace.
//!
//! # Workspace Overlay
//!
//! A lookup scoped to a workspace sees the records of that workspace and of
//! all its base workspaces. *Reducing* lookups (`find_one_by_path`,
//! `find_by_parent`, `find_one_by_identifier`) return at most one variant per
//! node identifier:
//!
//! 1. Only variants in the workspace chain that match the requested
//!    dimensions are considered.
//! 2. The variant in the nearest workspace wins; ties are broken by the
//!    dimension fallback order of the request.
//! 3. The winner must be located at the requested path (or under the requested
//!    parent). A node moved away in a nearer workspace no longer shows at its
//!    old path.
//!
//! Winners may be tombstones (`removed == true`); filtering them is up to the
//! caller. `*_without_reduce` lookups return every variant in the chain.
//!
//! # Consistency
//!
//! Backends enforce two uniqueness keys per workspace:
//! `(path hash, workspace, dimensions hash)` and
//! `(identifier, workspace, dimensions hash)`. Every stored record carries a
//! `version`; updates and removals with a stale version fail with
//! [`RepositoryError::VersionConflict`]. [`apply_batch`] applies several
//! operations all-or-nothing and checks uniqueness once all of them are
//! applied.
//!
//! [`apply_batch`]: NodeRecordRepository::apply_batch

use crate::db::RepositoryError;
use crate::models::path::{is_descendant_of, parent_path};
use crate::models::{DimensionRequest, NodeRecord, Workspace};
use async_trait::async_trait;
use uuid::Uuid;

/// Gap between indexes assigned to new siblings
pub const INDEX_GAP: i64 = 100;

/// One write inside an atomic batch
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Store a new record (version becomes 1)
    Add(NodeRecord),
    /// Replace a stored record with the same persistence id (version + 1)
    Update(NodeRecord),
    /// Delete a stored record
    Remove(NodeRecord),
}

impl StoreOperation {
    pub fn record(&self) -> &NodeRecord {
        match self {
            StoreOperation::Add(record)
            | StoreOperation::Update(record)
            | StoreOperation::Remove(record) => record,
        }
    }
}

/// Where a new sibling index is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPosition {
    /// Before all existing siblings
    First,
    /// After all existing siblings
    Last,
}

/// Abstraction over node record persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; they are shared by every service
/// and context through an `Arc<dyn NodeRecordRepository>`.
#[async_trait]
pub trait NodeRecordRepository: Send + Sync {
    //
    // REDUCING LOOKUPS
    //

    /// Visible variant at `path`, see the module docs for the overlay rules
    async fn find_one_by_path(
        &self,
        path: &str,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Option<NodeRecord>, RepositoryError>;

    /// Visible children of `parent_path`, ordered by index
    ///
    /// `node_types`, if given, keeps only records of one of these type names.
    async fn find_by_parent(
        &self,
        parent_path: &str,
        node_types: Option<&[String]>,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Visible variant of the node with `identifier`, wherever it is located
    async fn find_one_by_identifier(
        &self,
        identifier: &str,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Option<NodeRecord>, RepositoryError>;

    //
    // UNREDUCED LOOKUPS
    //

    /// Every variant directly below `parent_path` in the workspace chain
    async fn find_by_parent_without_reduce(
        &self,
        parent_path: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Every variant anywhere below `path` in the workspace chain, by depth
    async fn find_descendants_without_reduce(
        &self,
        path: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Every variant of one node in the workspace chain, nearest workspace first
    async fn find_variants_by_identifier(
        &self,
        identifier: &str,
        workspace: &Workspace,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Records owned by exactly this workspace, tombstones included, by depth
    async fn find_by_workspace(
        &self,
        workspace_name: &str,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Record by technical key
    async fn find_by_persistence_id(
        &self,
        persistence_id: Uuid,
    ) -> Result<Option<NodeRecord>, RepositoryError>;

    //
    // WRITES
    //

    /// Apply all operations or none of them
    ///
    /// Returns the stored state of every added or updated record, in order.
    async fn apply_batch(
        &self,
        operations: Vec<StoreOperation>,
    ) -> Result<Vec<NodeRecord>, RepositoryError>;

    /// Store a new record
    async fn add(&self, record: NodeRecord) -> Result<NodeRecord, RepositoryError> {
        single(self.apply_batch(vec![StoreOperation::Add(record)]).await?)
    }

    /// Persist a changed record
    async fn update(&self, record: NodeRecord) -> Result<NodeRecord, RepositoryError> {
        single(self.apply_batch(vec![StoreOperation::Update(record)]).await?)
    }

    /// Physically delete a record
    async fn remove(&self, record: &NodeRecord) -> Result<(), RepositoryError> {
        self.apply_batch(vec![StoreOperation::Remove(record.clone())])
            .await
            .map(|_| ())
    }

    //
    // DERIVED
    //

    /// Number of records `find_by_parent` would return
    async fn count_by_parent_and_type(
        &self,
        parent_path: &str,
        node_types: Option<&[String]>,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<usize, RepositoryError> {
        Ok(self
            .find_by_parent(parent_path, node_types, workspace, dimensions)
            .await?
            .len())
    }

    /// Visible records from `start_path` down to `end_path`, both included
    ///
    /// Empty if `end_path` is not `start_path` or one of its descendants.
    /// Missing intermediate nodes are skipped.
    async fn find_on_path(
        &self,
        start_path: &str,
        end_path: &str,
        workspace: &Workspace,
        dimensions: Option<&DimensionRequest>,
    ) -> Result<Vec<NodeRecord>, RepositoryError> {
        if start_path != end_path && !is_descendant_of(end_path, start_path) {
            return Ok(Vec::new());
        }

        let mut paths = vec![end_path.to_string()];
        let mut current = end_path.to_string();
        while current != start_path {
            current = parent_path(&current);
            paths.push(current.clone());
        }

        let mut records = Vec::with_capacity(paths.len());
        for path in paths.iter().rev() {
            if let Some(record) = self.find_one_by_path(path, workspace, dimensions).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Index for a new child of `parent_path` at `position`
    ///
    /// Considers all sibling variants in the workspace chain, so the result is
    /// unique among them.
    async fn next_index(
        &self,
        parent_path: &str,
        workspace: &Workspace,
        position: IndexPosition,
    ) -> Result<i64, RepositoryError> {
        let indexes: Vec<i64> = self
            .find_by_parent_without_reduce(parent_path, workspace)
            .await?
            .iter()
            .filter_map(NodeRecord::index)
            .collect();

        Ok(match position {
            IndexPosition::Last => indexes.iter().max().map_or(INDEX_GAP, |max| max + INDEX_GAP),
            IndexPosition::First => indexes.iter().min().map_or(INDEX_GAP, |min| min - INDEX_GAP),
        })
    }
}

fn single(mut stored: Vec<NodeRecord>) -> Result<NodeRecord, RepositoryError> {
    stored
        .pop()
        .ok_or_else(|| RepositoryError::Backend("batch returned no record".to_string()))
}

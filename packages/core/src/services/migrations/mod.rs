//! Node Migrations
//!
//! A migration walks the node tree of one workspace in pre-order and applies
//! configured rules to every node. A rule is a list of filters (all must
//! match) and a list of transformations applied in order. Rules are built
//! from a declarative [`MigrationConfiguration`] through a
//! [`MigrationRegistry`](crate::services::MigrationRegistry).
//!
//! The direction is handed to every transformation; traversal order is the
//! same for both directions.

pub mod filters;
pub mod transformations;

use crate::models::NodeRecord;
use crate::services::{
    ContentRepository, ContentRepositoryError, Context, ContextProperties, MigrationRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, ContentRepositoryError>;

/// Direction of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    Up,
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Predicate selecting the nodes a rule applies to
pub trait MigrationFilter: Send + Sync {
    fn matches(&self, node: &NodeRecord) -> bool;
}

/// In-place change of one node
pub trait MigrationTransformation: Send + Sync {
    /// Whether this transformation would change `node` at all
    fn is_transformable(&self, _node: &NodeRecord, _direction: MigrationDirection) -> bool {
        true
    }

    /// Apply the change; returns whether the node was modified
    fn execute(&self, node: &mut NodeRecord, direction: MigrationDirection) -> Result<bool>;
}

/// Filters plus transformations
#[derive(Default)]
pub struct MigrationRule {
    filters: Vec<Box<dyn MigrationFilter>>,
    transformations: Vec<Box<dyn MigrationTransformation>>,
}

impl MigrationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl MigrationFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn with_transformation(
        mut self,
        transformation: impl MigrationTransformation + 'static,
    ) -> Self {
        self.transformations.push(Box::new(transformation));
        self
    }

    pub(crate) fn push_filter(&mut self, filter: Box<dyn MigrationFilter>) {
        self.filters.push(filter);
    }

    pub(crate) fn push_transformation(&mut self, transformation: Box<dyn MigrationTransformation>) {
        self.transformations.push(transformation);
    }

    /// A rule without filters matches every node
    pub fn matches(&self, node: &NodeRecord) -> bool {
        self.filters.iter().all(|filter| filter.matches(node))
    }

    /// Run all transformations on `node`; returns whether any changed it
    pub fn apply(&self, node: &mut NodeRecord, direction: MigrationDirection) -> Result<bool> {
        let mut changed = false;
        for transformation in &self.transformations {
            if transformation.is_transformable(node, direction) {
                changed |= transformation.execute(node, direction)?;
            }
        }
        Ok(changed)
    }
}

/// Declarative migration: `{"migration": [{"filters": [...], "transformations": [...]}]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfiguration {
    #[serde(default)]
    pub migration: Vec<MigrationRuleConfiguration>,
}

impl MigrationConfiguration {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        use anyhow::Context as _;
        serde_json::from_str(json).context("Failed to parse migration configuration")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRuleConfiguration {
    #[serde(default)]
    pub filters: Vec<MigrationStepConfiguration>,
    #[serde(default)]
    pub transformations: Vec<MigrationStepConfiguration>,
}

/// One filter or transformation: registered type name plus its settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStepConfiguration {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub settings: Value,
}

/// Outcome of a migration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Nodes the walk reached
    pub visited: usize,
    /// Nodes changed and persisted
    pub transformed: usize,
    /// Nodes that disappeared before they were reached
    pub skipped: usize,
}

/// Rule-based migration of one workspace's node tree
pub struct NodeMigration {
    repository: ContentRepository,
    workspace_name: String,
    rules: Vec<MigrationRule>,
}

impl NodeMigration {
    pub fn new(
        repository: ContentRepository,
        workspace_name: impl Into<String>,
        rules: Vec<MigrationRule>,
    ) -> Self {
        Self {
            repository,
            workspace_name: workspace_name.into(),
            rules,
        }
    }

    /// Build the rules of `configuration` with the factories of `registry`
    pub fn from_configuration(
        repository: ContentRepository,
        workspace_name: impl Into<String>,
        configuration: &MigrationConfiguration,
        registry: &MigrationRegistry,
    ) -> Result<Self> {
        let rules = registry.build_rules(configuration)?;
        Ok(Self::new(repository, workspace_name, rules))
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    pub fn rules(&self) -> &[MigrationRule] {
        &self.rules
    }

    pub async fn migrate_up(&self) -> Result<MigrationReport> {
        self.migrate(MigrationDirection::Up).await
    }

    pub async fn migrate_down(&self) -> Result<MigrationReport> {
        self.migrate(MigrationDirection::Down).await
    }

    async fn migrate(&self, direction: MigrationDirection) -> Result<MigrationReport> {
        let mut context = self.repository.create_context_with(
            ContextProperties::new(&self.workspace_name)
                .invisible_content_shown(true)
                .removed_content_shown(true)
                .inaccessible_content_shown(true),
        );
        if context.get_workspace(false).await?.is_none() {
            return Err(ContentRepositoryError::migration(format!(
                "workspace \"{}\" does not exist",
                self.workspace_name
            )));
        }

        info!(
            "Migrating workspace {} {} with {} rules",
            self.workspace_name,
            direction,
            self.rules.len()
        );
        let root = context.get_root_node().await?;
        let report = self.walk_nodes(&mut context, root, direction).await?;
        info!(
            "Migration of {} finished: {} visited, {} transformed, {} skipped",
            self.workspace_name, report.visited, report.transformed, report.skipped
        );
        Ok(report)
    }

    /// Pre-order walk from `start`
    ///
    /// Children are read after the rules ran on their parent, so a node sees
    /// the changes applied to its ancestors. Nodes removed by an earlier step
    /// are skipped.
    async fn walk_nodes(
        &self,
        context: &mut Context,
        start: NodeRecord,
        direction: MigrationDirection,
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let mut pending = vec![start];

        while let Some(queued) = pending.pop() {
            let current = match self
                .repository
                .node_records()
                .find_by_persistence_id(queued.persistence_id())
                .await?
            {
                Some(current) => current,
                None => {
                    warn!("Skipping {}: node disappeared during migration", queued.path());
                    report.skipped += 1;
                    continue;
                }
            };
            report.visited += 1;

            let current = match self.migrate_node(context, &current, direction).await? {
                Some(changed) => {
                    report.transformed += 1;
                    changed
                }
                None => current,
            };

            let children = context.get_child_nodes(&current, None).await?;
            pending.extend(children.into_iter().rev());
        }

        Ok(report)
    }

    /// Apply every matching rule; returns the persisted node if any changed it
    ///
    /// A node inherited from a base workspace is adopted into the migrated
    /// workspace before the change is stored.
    async fn migrate_node(
        &self,
        context: &mut Context,
        node: &NodeRecord,
        direction: MigrationDirection,
    ) -> Result<Option<NodeRecord>> {
        let mut target = node.clone();
        if !self.apply_rules(&mut target, direction)? {
            return Ok(None);
        }
        if node.workspace_name() != context.workspace_name() {
            target = context.adopt_node(node).await?;
            self.apply_rules(&mut target, direction)?;
        }

        debug!("Migrated {} ({})", target.path(), direction);
        Ok(Some(self.repository.node_service().persist(target).await?))
    }

    fn apply_rules(&self, node: &mut NodeRecord, direction: MigrationDirection) -> Result<bool> {
        let mut changed = false;
        for rule in &self.rules {
            if rule.matches(node) {
                changed |= rule.apply(node, direction)?;
            }
        }
        Ok(changed)
    }
}

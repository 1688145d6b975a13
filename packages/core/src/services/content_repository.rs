//! Content Repository
//!
//! Entry point wiring the repository backends, node types, security predicate
//! and services together. Cloning is cheap; all parts are shared.
//!
//! # Examples
//!
//! ```
//! # use contentrepo_core::services::ContentRepository;
//! # use contentrepo_core::config::ContentRepositoryConfig;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = ContentRepository::in_memory(ContentRepositoryConfig::default())?;
//! let mut context = repository.create_context("user-admin");
//!
//! let root = context.get_root_node().await?;
//! let page = context.create_node(&root, "about", None).await?;
//! assert_eq!(page.path(), "/about");
//!
//! let workspace = context.get_workspace(true).await?.unwrap();
//! repository.workspace_service().publish(&workspace, "live").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ContentRepositoryConfig;
use crate::db::{
    DomainEvent, InMemoryNodeRecordRepository, InMemoryWorkspaceRepository,
    NodeRecordRepository, WorkspaceRepository,
};
use crate::services::{
    ConfiguredNodeTypeManager, ContentRepositoryError, Context, ContextProperties,
    NodeRecordService, NodeTypeManager, RoleSet, SecurityContext, WorkspaceService,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared handles of one content repository
#[derive(Clone)]
pub struct ContentRepository {
    config: Arc<ContentRepositoryConfig>,
    node_records: Arc<dyn NodeRecordRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    node_types: Arc<dyn NodeTypeManager>,
    security: Arc<dyn SecurityContext>,
    node_service: NodeRecordService,
    workspace_service: WorkspaceService,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl ContentRepository {
    /// Wire a repository from backends
    ///
    /// Node types are resolved from the configuration; the security predicate
    /// defaults to a caller without roles.
    pub fn new(
        config: ContentRepositoryConfig,
        node_records: Arc<dyn NodeRecordRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
    ) -> Result<Self, ContentRepositoryError> {
        let node_types = Arc::new(ConfiguredNodeTypeManager::from_configuration(
            &config.node_types,
        )?);
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let config = Arc::new(config);

        let node_service = NodeRecordService::new(
            node_records.clone(),
            workspaces.clone(),
            node_types.clone(),
            config.clone(),
            event_tx.clone(),
        );
        let workspace_service = WorkspaceService::new(
            node_records.clone(),
            workspaces.clone(),
            config.clone(),
            event_tx.clone(),
        );

        Ok(Self {
            config,
            node_records,
            workspaces,
            node_types,
            security: Arc::new(RoleSet::default()),
            node_service,
            workspace_service,
            event_tx,
        })
    }

    /// Repository backed by the in-memory store
    pub fn in_memory(config: ContentRepositoryConfig) -> Result<Self, ContentRepositoryError> {
        Self::new(
            config,
            Arc::new(InMemoryNodeRecordRepository::new()),
            Arc::new(InMemoryWorkspaceRepository::new()),
        )
    }

    /// Replace the security predicate
    pub fn with_security(mut self, security: Arc<dyn SecurityContext>) -> Self {
        self.security = security;
        self
    }

    /// Replace the node type manager
    pub fn with_node_type_manager(mut self, node_types: Arc<dyn NodeTypeManager>) -> Self {
        self.node_service = NodeRecordService::new(
            self.node_records.clone(),
            self.workspaces.clone(),
            node_types.clone(),
            self.config.clone(),
            self.event_tx.clone(),
        );
        self.node_types = node_types;
        self
    }

    pub fn config(&self) -> &ContentRepositoryConfig {
        &self.config
    }

    pub fn node_records(&self) -> &Arc<dyn NodeRecordRepository> {
        &self.node_records
    }

    pub fn workspaces(&self) -> &Arc<dyn WorkspaceRepository> {
        &self.workspaces
    }

    pub fn node_types(&self) -> &Arc<dyn NodeTypeManager> {
        &self.node_types
    }

    pub fn security(&self) -> &Arc<dyn SecurityContext> {
        &self.security
    }

    pub fn node_service(&self) -> &NodeRecordService {
        &self.node_service
    }

    pub fn workspace_service(&self) -> &WorkspaceService {
        &self.workspace_service
    }

    /// Subscribe to domain events of all services
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Context for `workspace_name` with configured dimension defaults
    pub fn create_context(&self, workspace_name: &str) -> Context {
        self.create_context_with(ContextProperties::new(workspace_name))
    }

    /// Context with explicit properties
    pub fn create_context_with(&self, properties: ContextProperties) -> Context {
        Context::new(self.clone(), properties)
    }
}

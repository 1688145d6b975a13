//! Business Services
//!
//! This module contains the content repository services:
//!
//! - `ContentRepository` - Wires backends, node types and services together
//! - `Context` - Workspace, dimension and visibility scope for lookups
//! - `NodeRecordService` - Node creation, renames, removal and persistence
//! - `WorkspaceService` - Workspace creation and publishing
//! - `NodeTypeManager` - Resolved node type metadata
//! - `NodeMigration` - Rule-based tree migrations, built via `MigrationRegistry`
//!
//! Services coordinate between the repository layer and callers, enforcing
//! the tree invariants and emitting domain events.

mod content_repository;
mod context;
pub mod error;
pub mod migration_registry;
pub mod migrations;
mod node_record_service;
mod node_type_manager;
mod security;
mod workspace_service;

pub use content_repository::ContentRepository;
pub use context::{Context, ContextProperties, NodePathRef};
pub use error::ContentRepositoryError;
pub use migration_registry::{FilterFactory, MigrationRegistry, TransformationFactory};
pub use migrations::{
    MigrationConfiguration, MigrationDirection, MigrationFilter, MigrationReport, MigrationRule,
    MigrationTransformation, NodeMigration,
};
pub use node_record_service::{CreateNodeOptions, NodeRecordService};
pub use node_type_manager::{ConfiguredNodeTypeManager, NodeTypeManager};
pub use security::{RoleSet, SecurityContext};
pub use workspace_service::WorkspaceService;

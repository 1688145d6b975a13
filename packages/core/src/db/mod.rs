//! Persistence Layer
//!
//! This module defines the storage seams of the content repository:
//!
//! - [`NodeRecordRepository`] - Node record lookups with workspace overlay and
//!   atomic write batches
//! - [`WorkspaceRepository`] - Workspace lookup and registration
//! - [`DomainEvent`] - Change notifications broadcast by the services
//!
//! The in-memory backend in [`memory_store`] implements both repository traits
//! and is the default backend of
//! [`ContentRepository::in_memory`](crate::services::ContentRepository::in_memory).

mod error;
pub mod events;
pub mod memory_store;
mod node_record_repository;
mod workspace_repository;

pub use error::RepositoryError;
pub use events::DomainEvent;
pub use memory_store::{InMemoryNodeRecordRepository, InMemoryWorkspaceRepository};
pub use node_record_repository::{IndexPosition, NodeRecordRepository, StoreOperation, INDEX_GAP};
pub use workspace_repository::WorkspaceRepository;

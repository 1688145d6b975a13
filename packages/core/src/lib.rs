//! ContentRepo Core
//!
//! A hierarchical, workspace-aware, dimension-aware content repository.
//!
//! # Architecture
//!
//! - **Node records**: every node variant is one record, addressed by path,
//!   workspace and dimension values, identified across variants by a stable
//!   identifier
//! - **Workspaces**: named branches layered on a base workspace; lookups see
//!   the nearest variant, removals in a branch leave tombstones
//! - **Publishing**: moves a branch's records into a base workspace in one
//!   atomic batch
//! - **Optimistic locking**: every persisted change bumps a record version;
//!   stale writes fail with `ConcurrentModification`
//!
//! # Modules
//!
//! - [`models`] - Data structures (NodeRecord, Workspace, dimensions, paths)
//! - [`db`] - Repository traits, store operations, events, in-memory backend
//! - [`services`] - Business services (Context, publishing, migrations)
//! - [`config`] - Repository configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::ContentRepositoryConfig;
pub use models::*;
pub use services::*;

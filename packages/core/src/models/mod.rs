//! Data Models
//!
//! This module contains the core data structures of the content repository:
//!
//! - `NodeRecord` - One stored node variant (path, workspace, dimensions)
//! - `NodeTemplate` - Blueprint used to create nodes from templates
//! - `Workspace` - Named branch with an optional base workspace
//! - `DimensionValues` / `DimensionRequest` - Content variant axes
//! - `PropertyStorage` - Inline properties or a delegate content object
//! - `NodeType` - Resolved node type metadata
//!
//! Models are plain data with pure derivations. Anything that reads or writes
//! the repository lives in [`services`](crate::services).

pub mod dimension;
mod node_record;
mod node_template;
pub mod node_type;
pub mod path;
pub mod properties;
mod workspace;

use thiserror::Error;

pub use dimension::{DimensionRequest, DimensionValues};
pub use node_record::{NodeRecord, SimilarizeSource, EVERYBODY_ROLE, LABEL_MAXIMUM_CHARACTERS};
pub use node_template::NodeTemplate;
pub use node_type::{
    ChildNodeConfiguration, NodeType, NodeTypeConfiguration, PropertyConfiguration,
    UNSTRUCTURED_NODE_TYPE,
};
pub use properties::{ContentObject, ContentObjectRef, PropertyStorage};
pub use workspace::Workspace;

/// Validation errors raised by pure model operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid node name: \"{name}\"")]
    InvalidNodeName { name: String },

    #[error("Invalid node context: {reason}")]
    InvalidNodeContext { reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

//! Domain Events
//!
//! Events emitted by the service layer after a repository change succeeded.
//! They are sent over a tokio broadcast channel, so any number of subscribers
//! (cache invalidation, search indexing, UI refresh) can observe changes
//! without coupling to the services.
//!
//! Delivery is best-effort: a send without subscribers, or a lagging
//! subscriber, never fails the operation that produced the event.

use crate::models::NodeRecord;

/// Domain events emitted by the content repository services
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A record was stored for the first time
    NodeAdded(NodeRecord),

    /// A stored record changed (properties, flags, workspace, tombstone)
    NodeUpdated(NodeRecord),

    /// A record was physically deleted
    NodeRemoved {
        identifier: String,
        path: String,
        workspace: String,
    },

    /// A record moved to a new path
    NodePathChanged {
        identifier: String,
        workspace: String,
        old_path: String,
        new_path: String,
    },

    /// A workspace and its root record were created
    WorkspaceCreated {
        name: String,
        base_workspace: Option<String>,
    },

    /// Records of one workspace were published into a base workspace
    NodesPublished {
        source_workspace: String,
        target_workspace: String,
        count: usize,
    },
}

impl DomainEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            DomainEvent::NodeAdded(_) => "node:added",
            DomainEvent::NodeUpdated(_) => "node:updated",
            DomainEvent::NodeRemoved { .. } => "node:removed",
            DomainEvent::NodePathChanged { .. } => "node:path-changed",
            DomainEvent::WorkspaceCreated { .. } => "workspace:created",
            DomainEvent::NodesPublished { .. } => "workspace:published",
        }
    }
}

//! Built-in migration filters

use super::MigrationFilter;
use crate::models::NodeRecord;
use serde::Deserialize;

/// Nodes of one node type (exact name), or all others with `exclude`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeFilter {
    pub node_type: String,
    #[serde(default)]
    pub exclude: bool,
}

impl NodeTypeFilter {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            exclude: false,
        }
    }

    pub fn excluding(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            exclude: true,
        }
    }
}

impl MigrationFilter for NodeTypeFilter {
    fn matches(&self, node: &NodeRecord) -> bool {
        (node.node_type == self.node_type) != self.exclude
    }
}

/// Nodes carrying a property that is neither null nor an empty string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyNotEmptyFilter {
    pub property_name: String,
}

impl MigrationFilter for PropertyNotEmptyFilter {
    fn matches(&self, node: &NodeRecord) -> bool {
        match node.get_property(&self.property_name) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// Tombstoned nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsRemovedFilter;

impl MigrationFilter for IsRemovedFilter {
    fn matches(&self, node: &NodeRecord) -> bool {
        node.is_removed()
    }
}

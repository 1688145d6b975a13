//! Node Type Manager
//!
//! Resolves configured node types into [`NodeType`] values. Super types are
//! resolved depth-first: a type inherits default values and auto-created child
//! nodes from its super types in declaration order, and its own declarations
//! win over inherited ones.

use crate::models::{NodeType, NodeTypeConfiguration, UNSTRUCTURED_NODE_TYPE};
use crate::services::ContentRepositoryError;
use serde_json::Map;
use std::collections::{BTreeMap, BTreeSet};

/// Source of node type metadata
pub trait NodeTypeManager: Send + Sync {
    fn get_node_type(&self, name: &str) -> Option<NodeType>;

    fn has_node_type(&self, name: &str) -> bool {
        self.get_node_type(name).is_some()
    }

    /// Every type that inherits from `super_type`, not including itself
    fn get_sub_node_types(&self, super_type: &str) -> Vec<NodeType>;

    fn get_node_types(&self) -> Vec<NodeType>;

    /// `type_name` followed by the names of all its sub types
    fn type_name_with_sub_types(&self, type_name: &str) -> Vec<String> {
        std::iter::once(type_name.to_string())
            .chain(
                self.get_sub_node_types(type_name)
                    .iter()
                    .map(|node_type| node_type.name().to_string()),
            )
            .collect()
    }
}

/// Node types resolved from configuration
#[derive(Debug, Clone)]
pub struct ConfiguredNodeTypeManager {
    node_types: BTreeMap<String, NodeType>,
}

impl ConfiguredNodeTypeManager {
    /// Manager knowing only the `unstructured` type
    pub fn new() -> Self {
        let mut node_types = BTreeMap::new();
        node_types.insert(
            UNSTRUCTURED_NODE_TYPE.to_string(),
            NodeType::new(UNSTRUCTURED_NODE_TYPE),
        );
        Self { node_types }
    }

    /// Resolve all configured types
    ///
    /// Fails with `InvalidConfiguration` on unknown super types and on
    /// inheritance cycles.
    pub fn from_configuration(
        configuration: &BTreeMap<String, NodeTypeConfiguration>,
    ) -> Result<Self, ContentRepositoryError> {
        let mut manager = Self::new();
        let mut resolved = BTreeMap::new();
        for name in configuration.keys() {
            let mut visiting = Vec::new();
            resolve(name, configuration, &mut resolved, &mut visiting)?;
        }
        manager.node_types.extend(resolved);
        Ok(manager)
    }

    /// Register an already built type, replacing one with the same name
    pub fn register(&mut self, node_type: NodeType) {
        self.node_types
            .insert(node_type.name().to_string(), node_type);
    }
}

impl Default for ConfiguredNodeTypeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTypeManager for ConfiguredNodeTypeManager {
    fn get_node_type(&self, name: &str) -> Option<NodeType> {
        self.node_types.get(name).cloned()
    }

    fn get_sub_node_types(&self, super_type: &str) -> Vec<NodeType> {
        self.node_types
            .values()
            .filter(|node_type| node_type.name() != super_type && node_type.is_of_type(super_type))
            .cloned()
            .collect()
    }

    fn get_node_types(&self) -> Vec<NodeType> {
        self.node_types.values().cloned().collect()
    }
}

fn resolve(
    name: &str,
    configuration: &BTreeMap<String, NodeTypeConfiguration>,
    resolved: &mut BTreeMap<String, NodeType>,
    visiting: &mut Vec<String>,
) -> Result<NodeType, ContentRepositoryError> {
    if let Some(node_type) = resolved.get(name) {
        return Ok(node_type.clone());
    }
    if visiting.iter().any(|v| v == name) {
        visiting.push(name.to_string());
        return Err(ContentRepositoryError::invalid_configuration(format!(
            "node type inheritance cycle: {}",
            visiting.join(" -> ")
        )));
    }

    let Some(config) = configuration.get(name) else {
        if name == UNSTRUCTURED_NODE_TYPE {
            return Ok(NodeType::new(UNSTRUCTURED_NODE_TYPE));
        }
        return Err(ContentRepositoryError::invalid_configuration(format!(
            "unknown node type \"{}\" referenced by \"{}\"",
            name,
            visiting.last().map(String::as_str).unwrap_or_default()
        )));
    };

    visiting.push(name.to_string());

    let mut super_types = BTreeSet::new();
    let mut default_values = Map::new();
    let mut child_nodes = BTreeMap::new();
    for super_name in &config.super_types {
        let parent = resolve(super_name, configuration, resolved, visiting)?;
        super_types.insert(super_name.clone());
        super_types.extend(
            parent
                .declared_super_types()
                .iter()
                .cloned()
                .chain(inherited_names(&parent, resolved)),
        );
        for (property, value) in parent.get_default_values_for_properties() {
            default_values.insert(property.clone(), value.clone());
        }
        child_nodes.extend(
            parent
                .get_auto_created_child_nodes()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    for (property, property_config) in &config.properties {
        if let Some(value) = &property_config.default_value {
            default_values.insert(property.clone(), value.clone());
        }
    }
    for (child_name, child_config) in &config.child_nodes {
        child_nodes.insert(child_name.clone(), child_config.node_type.clone());
    }

    visiting.pop();

    let node_type = NodeType::resolved(
        name.to_string(),
        config.super_types.clone(),
        super_types,
        config.is_abstract,
        default_values,
        child_nodes,
    );
    resolved.insert(name.to_string(), node_type.clone());
    Ok(node_type)
}

/// All transitive super type names of an already resolved type
fn inherited_names(node_type: &NodeType, resolved: &BTreeMap<String, NodeType>) -> Vec<String> {
    let mut names = Vec::new();
    let mut pending: Vec<String> = node_type.declared_super_types().to_vec();
    while let Some(name) = pending.pop() {
        if names.contains(&name) {
            continue;
        }
        if let Some(parent) = resolved.get(&name) {
            pending.extend(parent.declared_super_types().iter().cloned());
        }
        names.push(name);
    }
    names
}

//! Node Type Metadata
//!
//! Node types are configured externally and resolved by a
//! [`NodeTypeManager`](crate::services::NodeTypeManager). Records only keep the
//! type name; creation consults the resolved type for default property values
//! and auto-created child nodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Type name assigned to records created without an explicit type
pub const UNSTRUCTURED_NODE_TYPE: &str = "unstructured";

/// Declarative configuration of one node type
///
/// # Examples
///
/// ```
/// # use contentrepo_core::models::NodeTypeConfiguration;
/// let config: NodeTypeConfiguration = serde_json::from_value(serde_json::json!({
///     "superTypes": ["document"],
///     "properties": { "title": { "defaultValue": "Untitled" } },
///     "childNodes": { "main": { "type": "contentCollection" } }
/// })).unwrap();
/// assert_eq!(config.super_types, vec!["document".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeTypeConfiguration {
    /// Direct super types, nearest first
    pub super_types: Vec<String>,

    /// Abstract types cannot be instantiated
    #[serde(rename = "abstract")]
    pub is_abstract: bool,

    /// Property declarations
    pub properties: BTreeMap<String, PropertyConfiguration>,

    /// Child nodes created together with a node of this type
    pub child_nodes: BTreeMap<String, ChildNodeConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyConfiguration {
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildNodeConfiguration {
    #[serde(rename = "type")]
    pub node_type: String,
}

/// Resolved node type with inherited defaults and child nodes
#[derive(Debug, Clone, PartialEq)]
pub struct NodeType {
    name: String,
    declared_super_types: Vec<String>,
    super_types: BTreeSet<String>,
    is_abstract: bool,
    default_values: Map<String, Value>,
    auto_created_child_nodes: BTreeMap<String, String>,
}

impl NodeType {
    /// Create a type without super types, defaults or child nodes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_super_types: Vec::new(),
            super_types: BTreeSet::new(),
            is_abstract: false,
            default_values: Map::new(),
            auto_created_child_nodes: BTreeMap::new(),
        }
    }

    /// Add a super type; only its name is recorded
    pub fn with_super_type(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.super_types.insert(name.clone());
        self.declared_super_types.push(name);
        self
    }

    /// Add a default property value
    pub fn with_default_value(mut self, property: impl Into<String>, value: Value) -> Self {
        self.default_values.insert(property.into(), value);
        self
    }

    /// Add an auto-created child node
    pub fn with_child_node(mut self, name: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.auto_created_child_nodes
            .insert(name.into(), node_type.into());
        self
    }

    pub(crate) fn resolved(
        name: String,
        declared_super_types: Vec<String>,
        super_types: BTreeSet<String>,
        is_abstract: bool,
        default_values: Map<String, Value>,
        auto_created_child_nodes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name,
            declared_super_types,
            super_types,
            is_abstract,
            default_values,
            auto_created_child_nodes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Super types as declared in configuration
    pub fn declared_super_types(&self) -> &[String] {
        &self.declared_super_types
    }

    /// True if this type is `type_name` or inherits from it
    pub fn is_of_type(&self, type_name: &str) -> bool {
        self.name == type_name || self.super_types.contains(type_name)
    }

    /// Default values applied to new nodes of this type
    pub fn get_default_values_for_properties(&self) -> &Map<String, Value> {
        &self.default_values
    }

    /// Child node name to child node type, created with every new node
    pub fn get_auto_created_child_nodes(&self) -> &BTreeMap<String, String> {
        &self.auto_created_child_nodes
    }
}

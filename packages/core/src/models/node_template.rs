//! Node Templates
//!
//! A template describes a node that does not exist yet. Creating a node from a
//! template makes the new record similar to it (see
//! [`NodeRecord::similarize`](crate::models::NodeRecord::similarize)).

use crate::models::node_type::UNSTRUCTURED_NODE_TYPE;
use crate::models::properties::{ContentObjectRef, PropertyStorage};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Blueprint for a new node
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    /// Preferred node name; a suffix is appended on collision
    pub name: Option<String>,

    /// Identifier for the created node; generated when absent
    pub identifier: Option<String>,

    pub node_type: String,
    pub hidden: bool,
    pub hidden_before_date_time: Option<DateTime<Utc>>,
    pub hidden_after_date_time: Option<DateTime<Utc>>,
    pub hidden_in_index: bool,
    pub access_roles: Vec<String>,
    properties: PropertyStorage,
}

impl NodeTemplate {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            name: None,
            identifier: None,
            node_type: node_type.into(),
            hidden: false,
            hidden_before_date_time: None,
            hidden_after_date_time: None,
            hidden_in_index: false,
            access_roles: Vec::new(),
            properties: PropertyStorage::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_property(mut self, name: &str, value: Value) -> Self {
        self.properties.set(name, value);
        self
    }

    pub fn set_property(&mut self, name: &str, value: Value) -> bool {
        self.properties.set(name, value)
    }

    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> Map<String, Value> {
        self.properties.to_map()
    }

    pub fn property_storage(&self) -> &PropertyStorage {
        &self.properties
    }

    pub fn set_content_object(&mut self, object: ContentObjectRef) {
        self.properties = PropertyStorage::Delegate(object);
    }
}

impl Default for NodeTemplate {
    fn default() -> Self {
        Self::new(UNSTRUCTURED_NODE_TYPE)
    }
}

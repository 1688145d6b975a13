//! Property Storage
//!
//! A node keeps its properties either inline (a JSON object) or in an attached
//! content object that acts as an alternative property container. Exactly one
//! of the two is active: once a content object is attached, every property
//! read, write and enumeration goes through it and the inline map is ignored.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// External object that stores the properties of a node
///
/// Implementations decide which properties are gettable and settable.
/// Methods take `&self`; implementations use interior mutability.
pub trait ContentObject: Send + Sync {
    /// Type name used in diagnostics
    fn type_name(&self) -> &str;

    /// Read a property; `None` if the object has no such gettable property
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Write a property; returns `false` if the property is not settable
    fn set_property(&self, name: &str, value: Value) -> bool;

    /// Whether the property is gettable
    fn has_property(&self, name: &str) -> bool;

    /// Names of all gettable properties
    fn property_names(&self) -> Vec<String>;

    /// Clear a property; returns `false` if the object does not support it
    fn unset_property(&self, _name: &str) -> bool {
        false
    }
}

/// Shared handle to a content object
pub type ContentObjectRef = Arc<dyn ContentObject>;

/// Inline properties or a delegate content object, never both
#[derive(Clone)]
pub enum PropertyStorage {
    Inline(Map<String, Value>),
    Delegate(ContentObjectRef),
}

impl Default for PropertyStorage {
    fn default() -> Self {
        PropertyStorage::Inline(Map::new())
    }
}

impl fmt::Debug for PropertyStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyStorage::Inline(map) => f.debug_tuple("Inline").field(map).finish(),
            PropertyStorage::Delegate(object) => {
                f.debug_tuple("Delegate").field(&object.type_name()).finish()
            }
        }
    }
}

impl PropertyStorage {
    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            PropertyStorage::Inline(map) => map.get(name).cloned(),
            PropertyStorage::Delegate(object) => object.get_property(name),
        }
    }

    /// Set a property; delegates silently ignore properties they cannot set
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self {
            PropertyStorage::Inline(map) => {
                map.insert(name.to_string(), value);
                true
            }
            PropertyStorage::Delegate(object) => object.set_property(name, value),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        match self {
            PropertyStorage::Inline(map) => map.contains_key(name),
            PropertyStorage::Delegate(object) => object.has_property(name),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self {
            PropertyStorage::Inline(map) => map.remove(name).is_some(),
            PropertyStorage::Delegate(object) => object.unset_property(name),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            PropertyStorage::Inline(map) => map.keys().cloned().collect(),
            PropertyStorage::Delegate(object) => object.property_names(),
        }
    }

    /// Snapshot of all readable properties
    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            PropertyStorage::Inline(map) => map.clone(),
            PropertyStorage::Delegate(object) => object
                .property_names()
                .into_iter()
                .filter_map(|name| object.get_property(&name).map(|value| (name, value)))
                .collect(),
        }
    }

    pub fn content_object(&self) -> Option<&ContentObjectRef> {
        match self {
            PropertyStorage::Inline(_) => None,
            PropertyStorage::Delegate(object) => Some(object),
        }
    }
}

// Serialized form is always the flat property map; a delegate is written out
// as its current values and read back as inline properties.
impl Serialize for PropertyStorage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyStorage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(PropertyStorage::Inline(Map::deserialize(deserializer)?))
    }
}

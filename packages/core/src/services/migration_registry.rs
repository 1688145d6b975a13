//! Migration Registry
//!
//! Named factories turning the `{type, settings}` entries of a
//! [`MigrationConfiguration`] into filter and transformation objects.
//!
//! ## Built-ins
//!
//! - Filters: `NodeType`, `PropertyNotEmpty`, `IsRemoved`
//! - Transformations: `ChangeNodeType`, `RenameProperty`, `AddNewProperty`,
//!   `RemoveProperty`
//!
//! ## Example Usage
//!
//! ```
//! # use contentrepo_core::services::{MigrationRegistry, MigrationConfiguration};
//! # use serde_json::json;
//! let registry = MigrationRegistry::with_builtins();
//! let configuration: MigrationConfiguration = serde_json::from_value(json!({
//!     "migration": [{
//!         "filters": [{ "type": "NodeType", "settings": { "nodeType": "page" } }],
//!         "transformations": [{
//!             "type": "RenameProperty",
//!             "settings": { "from": "headline", "to": "title" }
//!         }]
//!     }]
//! })).unwrap();
//!
//! let rules = registry.build_rules(&configuration).unwrap();
//! assert_eq!(rules.len(), 1);
//! ```

use crate::services::migrations::filters::{IsRemovedFilter, NodeTypeFilter, PropertyNotEmptyFilter};
use crate::services::migrations::transformations::{
    AddNewProperty, ChangeNodeType, RemoveProperty, RenameProperty,
};
use crate::services::migrations::{
    MigrationConfiguration, MigrationFilter, MigrationRule, MigrationTransformation,
};
use crate::services::ContentRepositoryError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Builds a filter from its settings
pub type FilterFactory = fn(&Value) -> Result<Box<dyn MigrationFilter>, ContentRepositoryError>;

/// Builds a transformation from its settings
pub type TransformationFactory =
    fn(&Value) -> Result<Box<dyn MigrationTransformation>, ContentRepositoryError>;

fn settings<T: DeserializeOwned>(kind: &str, settings: &Value) -> Result<T, ContentRepositoryError> {
    serde_json::from_value(settings.clone()).map_err(|e| {
        ContentRepositoryError::migration(format!("invalid settings for {}: {}", kind, e))
    })
}

fn node_type_filter(value: &Value) -> Result<Box<dyn MigrationFilter>, ContentRepositoryError> {
    Ok(Box::new(settings::<NodeTypeFilter>("NodeType", value)?))
}

fn property_not_empty_filter(
    value: &Value,
) -> Result<Box<dyn MigrationFilter>, ContentRepositoryError> {
    Ok(Box::new(settings::<PropertyNotEmptyFilter>(
        "PropertyNotEmpty",
        value,
    )?))
}

fn is_removed_filter(_: &Value) -> Result<Box<dyn MigrationFilter>, ContentRepositoryError> {
    Ok(Box::new(IsRemovedFilter))
}

fn change_node_type(
    value: &Value,
) -> Result<Box<dyn MigrationTransformation>, ContentRepositoryError> {
    Ok(Box::new(settings::<ChangeNodeType>("ChangeNodeType", value)?))
}

fn rename_property(
    value: &Value,
) -> Result<Box<dyn MigrationTransformation>, ContentRepositoryError> {
    Ok(Box::new(settings::<RenameProperty>("RenameProperty", value)?))
}

fn add_new_property(
    value: &Value,
) -> Result<Box<dyn MigrationTransformation>, ContentRepositoryError> {
    Ok(Box::new(settings::<AddNewProperty>("AddNewProperty", value)?))
}

fn remove_property(
    value: &Value,
) -> Result<Box<dyn MigrationTransformation>, ContentRepositoryError> {
    Ok(Box::new(settings::<RemoveProperty>("RemoveProperty", value)?))
}

/// Registry of filter and transformation factories by type name
pub struct MigrationRegistry {
    filters: HashMap<String, FilterFactory>,
    transformations: HashMap<String, TransformationFactory>,
}

impl MigrationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
            transformations: HashMap::new(),
        }
    }

    /// Registry with all built-in filters and transformations
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_filter("NodeType", node_type_filter);
        registry.register_filter("PropertyNotEmpty", property_not_empty_filter);
        registry.register_filter("IsRemoved", is_removed_filter);
        registry.register_transformation("ChangeNodeType", change_node_type);
        registry.register_transformation("RenameProperty", rename_property);
        registry.register_transformation("AddNewProperty", add_new_property);
        registry.register_transformation("RemoveProperty", remove_property);
        registry
    }

    /// Register a filter factory, replacing one with the same name
    pub fn register_filter(&mut self, name: impl Into<String>, factory: FilterFactory) {
        self.filters.insert(name.into(), factory);
    }

    /// Register a transformation factory, replacing one with the same name
    pub fn register_transformation(
        &mut self,
        name: impl Into<String>,
        factory: TransformationFactory,
    ) {
        self.transformations.insert(name.into(), factory);
    }

    pub fn create_filter(
        &self,
        name: &str,
        settings: &Value,
    ) -> Result<Box<dyn MigrationFilter>, ContentRepositoryError> {
        let factory = self.filters.get(name).ok_or_else(|| {
            ContentRepositoryError::migration(format!("unknown migration filter \"{}\"", name))
        })?;
        factory(settings)
    }

    pub fn create_transformation(
        &self,
        name: &str,
        settings: &Value,
    ) -> Result<Box<dyn MigrationTransformation>, ContentRepositoryError> {
        let factory = self.transformations.get(name).ok_or_else(|| {
            ContentRepositoryError::migration(format!(
                "unknown migration transformation \"{}\"",
                name
            ))
        })?;
        factory(settings)
    }

    /// Build one rule per configured entry, in configured order
    pub fn build_rules(
        &self,
        configuration: &MigrationConfiguration,
    ) -> Result<Vec<MigrationRule>, ContentRepositoryError> {
        configuration
            .migration
            .iter()
            .map(|entry| {
                let mut rule = MigrationRule::new();
                for filter in &entry.filters {
                    rule.push_filter(self.create_filter(&filter.step_type, &filter.settings)?);
                }
                for transformation in &entry.transformations {
                    rule.push_transformation(self.create_transformation(
                        &transformation.step_type,
                        &transformation.settings,
                    )?);
                }
                Ok(rule)
            })
            .collect()
    }

    /// Number of registered filter factories
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Number of registered transformation factories
    pub fn transformation_count(&self) -> usize {
        self.transformations.len()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeRecord;
    use crate::services::migrations::MigrationDirection;
    use serde_json::json;

    struct AlwaysFilter;

    impl MigrationFilter for AlwaysFilter {
        fn matches(&self, _node: &NodeRecord) -> bool {
            true
        }
    }

    fn always(_: &Value) -> Result<Box<dyn MigrationFilter>, ContentRepositoryError> {
        Ok(Box::new(AlwaysFilter))
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = MigrationRegistry::new();
        assert_eq!(registry.filter_count(), 0);
        assert_eq!(registry.transformation_count(), 0);
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = MigrationRegistry::default();
        assert_eq!(registry.filter_count(), 3);
        assert_eq!(registry.transformation_count(), 4);
    }

    #[test]
    fn test_custom_filter_registration() {
        let mut registry = MigrationRegistry::new();
        registry.register_filter("Always", always);

        let filter = registry.create_filter("Always", &Value::Null).unwrap();
        let node = NodeRecord::new("/a", "live", None, None).unwrap();
        assert!(filter.matches(&node));
    }

    #[test]
    fn test_unknown_names_fail() {
        let registry = MigrationRegistry::with_builtins();
        assert!(matches!(
            registry.create_filter("Missing", &Value::Null),
            Err(ContentRepositoryError::MigrationError(_))
        ));
        assert!(matches!(
            registry.create_transformation("Missing", &Value::Null),
            Err(ContentRepositoryError::MigrationError(_))
        ));
    }

    #[test]
    fn test_invalid_settings_fail() {
        let registry = MigrationRegistry::with_builtins();
        let result = registry.create_transformation("RenameProperty", &json!({ "from": "a" }));
        match result {
            Err(ContentRepositoryError::MigrationError(msg)) => {
                assert!(msg.contains("RenameProperty"));
            }
            _ => panic!("expected settings error"),
        }
    }

    #[test]
    fn test_build_rules_applies_filters_and_transformations() {
        let registry = MigrationRegistry::with_builtins();
        let configuration: MigrationConfiguration = serde_json::from_value(json!({
            "migration": [{
                "filters": [{ "type": "NodeType", "settings": { "nodeType": "page" } }],
                "transformations": [
                    { "type": "ChangeNodeType", "settings": { "newType": "article", "oldType": "page" } },
                    { "type": "AddNewProperty", "settings": { "newPropertyName": "layout", "value": "wide" } }
                ]
            }]
        }))
        .unwrap();

        let rules = registry.build_rules(&configuration).unwrap();
        assert_eq!(rules.len(), 1);

        let mut page = NodeRecord::new("/page", "live", None, None).unwrap();
        page.node_type = "page".to_string();
        let text = NodeRecord::new("/text", "live", None, None).unwrap();

        assert!(rules[0].matches(&page));
        assert!(!rules[0].matches(&text));
        assert!(rules[0].apply(&mut page, MigrationDirection::Up).unwrap());
        assert_eq!(page.node_type, "article");
        assert_eq!(page.get_property("layout"), Some(json!("wide")));
    }
}

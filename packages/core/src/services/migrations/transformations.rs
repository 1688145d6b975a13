//! Built-in migration transformations
//!
//! `Down` undoes `Up` where the settings carry enough information:
//! `ChangeNodeType` needs `oldType`, `RemoveProperty` cannot be undone.

use super::{MigrationDirection, MigrationTransformation};
use crate::models::NodeRecord;
use crate::services::ContentRepositoryError;
use serde::Deserialize;
use serde_json::Value;

/// Set the node type
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNodeType {
    pub new_type: String,
    #[serde(default)]
    pub old_type: Option<String>,
}

impl MigrationTransformation for ChangeNodeType {
    fn is_transformable(&self, node: &NodeRecord, direction: MigrationDirection) -> bool {
        match direction {
            MigrationDirection::Up => node.node_type != self.new_type,
            MigrationDirection::Down => {
                self.old_type.is_some() && node.node_type == self.new_type
            }
        }
    }

    fn execute(
        &self,
        node: &mut NodeRecord,
        direction: MigrationDirection,
    ) -> Result<bool, ContentRepositoryError> {
        let target = match direction {
            MigrationDirection::Up => &self.new_type,
            MigrationDirection::Down => match &self.old_type {
                Some(old_type) => old_type,
                None => return Ok(false),
            },
        };
        if node.node_type == *target {
            return Ok(false);
        }
        node.node_type = target.clone();
        Ok(true)
    }
}

/// Move a property value to a new name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameProperty {
    pub from: String,
    pub to: String,
}

impl MigrationTransformation for RenameProperty {
    fn is_transformable(&self, node: &NodeRecord, direction: MigrationDirection) -> bool {
        match direction {
            MigrationDirection::Up => node.has_property(&self.from),
            MigrationDirection::Down => node.has_property(&self.to),
        }
    }

    fn execute(
        &self,
        node: &mut NodeRecord,
        direction: MigrationDirection,
    ) -> Result<bool, ContentRepositoryError> {
        let (from, to) = match direction {
            MigrationDirection::Up => (&self.from, &self.to),
            MigrationDirection::Down => (&self.to, &self.from),
        };
        let Some(value) = node.get_property(from) else {
            return Ok(false);
        };
        if !node.set_property(to, value) {
            return Err(ContentRepositoryError::migration(format!(
                "cannot set property \"{}\" on {}",
                to,
                node.path()
            )));
        }
        node.remove_property(from);
        Ok(true)
    }
}

/// Add a property with a fixed value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNewProperty {
    pub new_property_name: String,
    pub value: Value,
}

impl MigrationTransformation for AddNewProperty {
    fn execute(
        &self,
        node: &mut NodeRecord,
        direction: MigrationDirection,
    ) -> Result<bool, ContentRepositoryError> {
        match direction {
            MigrationDirection::Up => {
                if node.get_property(&self.new_property_name).as_ref() == Some(&self.value) {
                    return Ok(false);
                }
                if !node.set_property(&self.new_property_name, self.value.clone()) {
                    return Err(ContentRepositoryError::migration(format!(
                        "cannot set property \"{}\" on {}",
                        self.new_property_name,
                        node.path()
                    )));
                }
                Ok(true)
            }
            MigrationDirection::Down => Ok(node.remove_property(&self.new_property_name)),
        }
    }
}

/// Drop a property
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoveProperty {
    pub property: String,
}

impl MigrationTransformation for RemoveProperty {
    fn is_transformable(&self, node: &NodeRecord, direction: MigrationDirection) -> bool {
        direction == MigrationDirection::Up && node.has_property(&self.property)
    }

    fn execute(
        &self,
        node: &mut NodeRecord,
        direction: MigrationDirection,
    ) -> Result<bool, ContentRepositoryError> {
        if direction == MigrationDirection::Down {
            return Ok(false);
        }
        Ok(node.remove_property(&self.property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> NodeRecord {
        let mut node = NodeRecord::new("/sites/home", "live", None, None).unwrap();
        node.node_type = "page".to_string();
        node.set_property("headline", json!("Welcome"));
        node
    }

    #[test]
    fn test_change_node_type_up_and_down() {
        let change = ChangeNodeType {
            new_type: "landingPage".to_string(),
            old_type: Some("page".to_string()),
        };
        let mut node = page();

        assert!(change.execute(&mut node, MigrationDirection::Up).unwrap());
        assert_eq!(node.node_type, "landingPage");
        assert!(!change.is_transformable(&node, MigrationDirection::Up));

        assert!(change.execute(&mut node, MigrationDirection::Down).unwrap());
        assert_eq!(node.node_type, "page");
    }

    #[test]
    fn test_change_node_type_down_without_old_type_is_noop() {
        let change = ChangeNodeType {
            new_type: "landingPage".to_string(),
            old_type: None,
        };
        let mut node = page();
        node.node_type = "landingPage".to_string();

        assert!(!change.is_transformable(&node, MigrationDirection::Down));
        assert!(!change.execute(&mut node, MigrationDirection::Down).unwrap());
        assert_eq!(node.node_type, "landingPage");
    }

    #[test]
    fn test_rename_property_round_trip() {
        let rename = RenameProperty {
            from: "headline".to_string(),
            to: "title".to_string(),
        };
        let mut node = page();

        assert!(rename.execute(&mut node, MigrationDirection::Up).unwrap());
        assert!(!node.has_property("headline"));
        assert_eq!(node.get_property("title"), Some(json!("Welcome")));

        assert!(rename.execute(&mut node, MigrationDirection::Down).unwrap());
        assert!(!node.has_property("title"));
        assert_eq!(node.get_property("headline"), Some(json!("Welcome")));
    }

    #[test]
    fn test_add_new_property_is_idempotent() {
        let add = AddNewProperty {
            new_property_name: "layout".to_string(),
            value: json!("default"),
        };
        let mut node = page();

        assert!(add.execute(&mut node, MigrationDirection::Up).unwrap());
        assert!(!add.execute(&mut node, MigrationDirection::Up).unwrap());
        assert_eq!(node.get_property("layout"), Some(json!("default")));

        assert!(add.execute(&mut node, MigrationDirection::Down).unwrap());
        assert!(!node.has_property("layout"));
    }

    #[test]
    fn test_remove_property_only_runs_up() {
        let remove = RemoveProperty {
            property: "headline".to_string(),
        };
        let mut node = page();

        assert!(!remove.is_transformable(&node, MigrationDirection::Down));
        assert!(remove.execute(&mut node, MigrationDirection::Up).unwrap());
        assert!(!node.has_property("headline"));
    }
}

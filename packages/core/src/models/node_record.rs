//! Node Record
//!
//! This module defines [`NodeRecord`], the stored form of one node variant:
//! one path in one workspace for one combination of dimension values.
//!
//! # Identity
//!
//! - `persistence_id`: technical key of this stored row, unique across the store
//! - `identifier`: stable node identifier, shared by all workspace copies and
//!   dimension variants of the same logical node and kept across renames
//! - `(path, workspace, dimensions)`: structural key, unique in the store
//!
//! # Versioning
//!
//! `version` is 0 for a record that was never persisted. The repository sets
//! it to 1 on insert and increments it on every persisted mutation; writes
//! against a stale version are rejected (optimistic locking).
//!
//! Operations that need the repository (child creation, renames, removal) live
//! in [`NodeRecordService`](crate::services::NodeRecordService). This type only
//! holds data and pure derivations.

use crate::models::dimension::{DimensionRequest, DimensionValues};
use crate::models::node_template::NodeTemplate;
use crate::models::node_type::UNSTRUCTURED_NODE_TYPE;
use crate::models::path::{self, ROOT_PATH};
use crate::models::properties::{ContentObjectRef, PropertyStorage};
use crate::models::ValidationError;
use crate::services::SecurityContext;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

/// Role that grants access to everybody
pub const EVERYBODY_ROLE: &str = "Everybody";

/// Maximum number of characters of a node label
pub const LABEL_MAXIMUM_CHARACTERS: usize = 30;

/// One stored node variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    persistence_id: Uuid,
    identifier: String,
    path: String,
    parent_path: String,
    path_hash: String,
    depth: usize,
    workspace: String,
    index: Option<i64>,
    dimensions: DimensionValues,
    dimensions_hash: String,
    removed: bool,
    version: i64,
    properties: PropertyStorage,

    /// Name of the node type
    pub node_type: String,

    /// Hidden nodes are invisible unless the context shows invisible content
    pub hidden: bool,

    /// Node is hidden before this moment
    pub hidden_before_date_time: Option<DateTime<Utc>>,

    /// Node is hidden after this moment
    pub hidden_after_date_time: Option<DateTime<Utc>>,

    /// Node should be left out of menus and indexes
    pub hidden_in_index: bool,

    /// Roles allowed to access this node; empty means unrestricted
    pub access_roles: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Source of [`NodeRecord::similarize`]
///
/// The sibling index is only copied from a peer record, never from a template.
#[derive(Debug, Clone, Copy)]
pub enum SimilarizeSource<'a> {
    Record(&'a NodeRecord),
    Template(&'a NodeTemplate),
}

impl NodeRecord {
    /// Construct an unpersisted record
    ///
    /// Generates an identifier if none is given. Construction never persists
    /// or emits events; the record becomes stored once a repository adds it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use contentrepo_core::models::{NodeRecord, DimensionValues};
    /// let record = NodeRecord::new(
    ///     "/sites/example",
    ///     "live",
    ///     None,
    ///     Some(DimensionValues::new().with("language", ["en"])),
    /// ).unwrap();
    /// assert_eq!(record.name(), "example");
    /// assert_eq!(record.depth(), 2);
    /// assert_eq!(record.version(), 0);
    /// ```
    pub fn new(
        path: &str,
        workspace: impl Into<String>,
        identifier: Option<String>,
        dimensions: Option<DimensionValues>,
    ) -> Result<Self, ValidationError> {
        // Length limits are configured per repository and checked by the services
        path::validate_path(path, usize::MAX)?;

        let now = Utc::now();
        let dimensions = dimensions.unwrap_or_default();
        let dimensions_hash = dimensions.hash();
        let mut record = Self {
            persistence_id: Uuid::new_v4(),
            identifier: identifier.unwrap_or_else(|| Uuid::new_v4().to_string()),
            path: String::new(),
            parent_path: String::new(),
            path_hash: String::new(),
            depth: 0,
            workspace: workspace.into(),
            index: None,
            dimensions,
            dimensions_hash,
            removed: false,
            version: 0,
            properties: PropertyStorage::default(),
            node_type: UNSTRUCTURED_NODE_TYPE.to_string(),
            hidden: false,
            hidden_before_date_time: None,
            hidden_after_date_time: None,
            hidden_in_index: false,
            access_roles: Vec::new(),
            created_at: now,
            modified_at: now,
        };
        record.apply_path(path);
        Ok(record)
    }

    /// Construct the root record of a workspace
    pub fn new_root(workspace: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            persistence_id: Uuid::new_v4(),
            identifier: Uuid::new_v4().to_string(),
            path: ROOT_PATH.to_string(),
            parent_path: String::new(),
            path_hash: path::path_hash(ROOT_PATH),
            depth: 0,
            workspace: workspace.into(),
            index: None,
            dimensions: DimensionValues::new(),
            dimensions_hash: DimensionValues::new().hash(),
            removed: false,
            version: 0,
            properties: PropertyStorage::default(),
            node_type: UNSTRUCTURED_NODE_TYPE.to_string(),
            hidden: false,
            hidden_before_date_time: None,
            hidden_after_date_time: None,
            hidden_in_index: false,
            access_roles: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Unpersisted copy of this record for another workspace
    ///
    /// Keeps identifier, path and dimensions and takes over all attributes
    /// (including the index) from this record.
    pub fn copy_for_workspace(&self, workspace: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.persistence_id = Uuid::new_v4();
        copy.workspace = workspace.into();
        copy.version = 0;
        copy.removed = false;
        copy.created_at = Utc::now();
        copy.modified_at = copy.created_at;
        copy.similarize(SimilarizeSource::Record(self));
        copy
    }

    pub fn persistence_id(&self) -> Uuid {
        self.persistence_id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent path; empty for the root
    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn path_hash(&self) -> &str {
        &self.path_hash
    }

    /// Last path segment; empty for the root
    pub fn name(&self) -> &str {
        path::node_name(&self.path)
    }

    /// Level in the tree: 0 for `/`, 1 for `/foo`, 2 for `/foo/bar`
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }

    /// Name of the owning workspace
    pub fn workspace_name(&self) -> &str {
        &self.workspace
    }

    /// Sibling order; `None` until the repository assigns one
    pub fn index(&self) -> Option<i64> {
        self.index
    }

    pub fn dimensions(&self) -> &DimensionValues {
        &self.dimensions
    }

    pub fn dimensions_hash(&self) -> &str {
        &self.dimensions_hash
    }

    /// Tombstone flag, only ever set in workspaces with a base workspace
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Whether a repository has stored this record
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Path with workspace suffix, e.g. `/sites/example@user-admin`
    ///
    /// The suffix is left out for the live workspace.
    pub fn context_path(&self, live_workspace_name: &str) -> String {
        if self.workspace == live_workspace_name {
            self.path.clone()
        } else {
            format!("{}@{}", self.path, self.workspace)
        }
    }

    //
    // Internal mutators, used by services and repositories
    //

    /// Rewrite path and derived fields without validation or persistence
    pub(crate) fn apply_path(&mut self, new_path: &str) {
        self.path = new_path.to_string();
        self.path_hash = path::path_hash(new_path);
        self.parent_path = path::parent_path(new_path);
        self.depth = path::path_depth(new_path);
    }

    pub(crate) fn set_workspace_name(&mut self, workspace: impl Into<String>) {
        self.workspace = workspace.into();
    }

    pub(crate) fn set_index_value(&mut self, index: Option<i64>) {
        self.index = index;
    }

    pub(crate) fn set_removed_flag(&mut self, removed: bool) {
        self.removed = removed;
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Replace the dimension values and recompute their hash
    pub(crate) fn set_dimensions(&mut self, dimensions: DimensionValues) {
        self.dimensions_hash = dimensions.hash();
        self.dimensions = dimensions;
    }

    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    //
    // Properties
    //

    /// Read a property, from the content object if one is attached
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.properties.get(name)
    }

    /// Write a property; returns `false` if an attached content object refused it
    pub fn set_property(&mut self, name: &str, value: Value) -> bool {
        self.properties.set(name, value)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.has(name)
    }

    pub fn remove_property(&mut self, name: &str) -> bool {
        self.properties.remove(name)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties.names()
    }

    /// Snapshot of all readable properties
    pub fn properties(&self) -> Map<String, Value> {
        self.properties.to_map()
    }

    pub fn property_storage(&self) -> &PropertyStorage {
        &self.properties
    }

    /// Attach a content object; inline properties are bypassed from now on
    pub fn set_content_object(&mut self, object: ContentObjectRef) {
        self.properties = PropertyStorage::Delegate(object);
    }

    pub fn content_object(&self) -> Option<&ContentObjectRef> {
        self.properties.content_object()
    }

    /// Detach the content object, falling back to empty inline properties
    pub fn unset_content_object(&mut self) {
        if self.content_object().is_some() {
            self.properties = PropertyStorage::default();
        }
    }

    //
    // Derived behavior
    //

    /// Make this record similar to `source`
    ///
    /// Replaces all properties and copies node type, visibility attributes and
    /// access roles. The index is copied only from a peer record. A content
    /// object of the source is attached as well.
    pub fn similarize(&mut self, source: SimilarizeSource<'_>) {
        let (storage, node_type, hidden, before, after, in_index, roles) = match source {
            SimilarizeSource::Record(record) => {
                self.index = record.index;
                (
                    &record.properties,
                    &record.node_type,
                    record.hidden,
                    record.hidden_before_date_time,
                    record.hidden_after_date_time,
                    record.hidden_in_index,
                    &record.access_roles,
                )
            }
            SimilarizeSource::Template(template) => (
                template.property_storage(),
                &template.node_type,
                template.hidden,
                template.hidden_before_date_time,
                template.hidden_after_date_time,
                template.hidden_in_index,
                &template.access_roles,
            ),
        };

        self.properties = PropertyStorage::Inline(storage.to_map());
        self.node_type = node_type.clone();
        self.hidden = hidden;
        self.hidden_before_date_time = before;
        self.hidden_after_date_time = after;
        self.hidden_in_index = in_index;
        self.access_roles = roles.clone();

        if let Some(object) = storage.content_object() {
            self.properties = PropertyStorage::Delegate(object.clone());
        }
    }

    /// Move this record into a context's workspace and target dimensions
    ///
    /// Every dimension the context declares must have a target value; the
    /// record ends up with exactly that one value per declared dimension.
    pub fn adjust_to_context(
        &mut self,
        workspace: &str,
        declared_dimensions: &DimensionRequest,
        target_dimensions: &BTreeMap<String, String>,
    ) -> Result<(), ValidationError> {
        let mut dimensions = DimensionValues::new();
        for name in declared_dimensions.names() {
            let target = target_dimensions.get(name).ok_or_else(|| {
                ValidationError::InvalidNodeContext {
                    reason: format!("missing target value for dimension \"{}\"", name),
                }
            })?;
            dimensions.insert(name.clone(), [target.clone()]);
        }

        self.workspace = workspace.to_string();
        self.set_dimensions(dimensions);
        Ok(())
    }

    /// Whether this record belongs to `workspace` and matches `dimensions`
    pub fn matches_workspace_and_dimensions(
        &self,
        workspace: &str,
        dimensions: Option<&DimensionRequest>,
    ) -> bool {
        if self.workspace != workspace {
            return false;
        }
        dimensions.map_or(true, |requested| self.dimensions.matches(requested))
    }

    /// The `hidden` flag alone; see [`is_visible_at`](Self::is_visible_at)
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }

    /// Visibility at a moment, honoring the hidden-before/after window
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        if self.hidden {
            return false;
        }
        if self.hidden_before_date_time.is_some_and(|before| now < before) {
            return false;
        }
        if self.hidden_after_date_time.is_some_and(|after| now >= after) {
            return false;
        }
        true
    }

    /// Whether access roles restrict this node at all
    pub fn has_access_restrictions(&self) -> bool {
        if self.access_roles.is_empty() {
            return false;
        }
        !(self.access_roles.len() == 1 && self.access_roles[0] == EVERYBODY_ROLE)
    }

    /// Whether the current security context may access this node
    pub fn is_accessible(&self, security: &dyn SecurityContext) -> bool {
        if !self.has_access_restrictions() {
            return true;
        }
        self.access_roles.iter().any(|role| security.has_role(role))
    }

    /// Short plain-text description of this node
    ///
    /// Uses the `title` property, else `text`, else `(type) name`. Markup is
    /// stripped and the result is cropped to [`LABEL_MAXIMUM_CHARACTERS`].
    pub fn label(&self) -> String {
        let text_property = |name: &str| {
            self.get_property(name)
                .and_then(|value| value.as_str().map(str::to_string))
                .filter(|text| !text.is_empty())
        };

        let label = match text_property("title").or_else(|| text_property("text")) {
            Some(text) => strip_tags(&text),
            None => format!("({}) {}", self.node_type, self.name()),
        };

        let cropped: String = label.chars().take(LABEL_MAXIMUM_CHARACTERS).collect();
        if cropped.len() < label.len() {
            format!("{} …", cropped)
        } else {
            cropped
        }
    }
}

fn strip_tags(text: &str) -> String {
    static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());
    regex.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::properties::tests::RecordingObject;
    use crate::services::RoleSet;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn record(path: &str) -> NodeRecord {
        NodeRecord::new(path, "live", None, None).unwrap()
    }

    #[test]
    fn test_new_derives_path_fields() {
        let node = record("/sites/example/home");
        assert_eq!(node.name(), "home");
        assert_eq!(node.parent_path(), "/sites/example");
        assert_eq!(node.depth(), 3);
        assert_eq!(node.node_type, UNSTRUCTURED_NODE_TYPE);
        assert!(!node.is_persisted());
        assert!(!node.identifier().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_path() {
        let result = NodeRecord::new("not/absolute", "live", None, None);
        assert!(matches!(result, Err(ValidationError::InvalidPath { .. })));
    }

    #[test]
    fn test_new_leaves_length_limit_to_configuration() {
        let long = format!("/{}", "a".repeat(4500));
        let node = NodeRecord::new(&long, "live", None, None).unwrap();
        assert_eq!(node.depth(), 1);
    }

    #[test]
    fn test_root_record() {
        let root = NodeRecord::new_root("live");
        assert!(root.is_root());
        assert_eq!(root.name(), "");
        assert_eq!(root.depth(), 0);
        assert_eq!(root.parent_path(), "");
    }

    #[test]
    fn test_apply_path_recomputes_depth_and_hash() {
        let mut node = record("/a");
        let old_hash = node.path_hash().to_string();
        node.apply_path("/x/y");
        assert_eq!(node.depth(), 2);
        assert_eq!(node.parent_path(), "/x");
        assert_ne!(node.path_hash(), old_hash);
    }

    #[test]
    fn test_context_path_omits_live() {
        let mut node = record("/a/b");
        assert_eq!(node.context_path("live"), "/a/b");
        node.set_workspace_name("user-admin");
        assert_eq!(node.context_path("live"), "/a/b@user-admin");
    }

    #[test]
    fn test_similarize_from_record_copies_index_and_attributes() {
        let mut source = record("/a");
        source.set_property("title", json!("Source"));
        source.node_type = "page".to_string();
        source.hidden = true;
        source.hidden_in_index = true;
        source.access_roles = vec!["Editor".to_string()];
        source.set_index_value(Some(300));

        let mut target = record("/b");
        target.set_property("stale", json!(true));
        target.similarize(SimilarizeSource::Record(&source));

        assert_eq!(target.get_property("title"), Some(json!("Source")));
        assert!(!target.has_property("stale"));
        assert_eq!(target.node_type, "page");
        assert!(target.hidden);
        assert!(target.hidden_in_index);
        assert_eq!(target.access_roles, vec!["Editor".to_string()]);
        assert_eq!(target.index(), Some(300));
    }

    #[test]
    fn test_similarize_from_template_keeps_index() {
        let template = NodeTemplate::new("page")
            .with_property("title", json!("From template"));
        let mut target = record("/b");
        target.set_index_value(Some(100));

        target.similarize(SimilarizeSource::Template(&template));

        assert_eq!(target.index(), Some(100));
        assert_eq!(target.node_type, "page");
        assert_eq!(target.get_property("title"), Some(json!("From template")));
    }

    #[test]
    fn test_similarize_attaches_content_object() {
        let object = Arc::new(RecordingObject::new(&[("title", json!("Delegated"))]));
        let mut source = record("/a");
        source.set_content_object(object);

        let mut target = record("/b");
        target.similarize(SimilarizeSource::Record(&source));

        assert!(target.content_object().is_some());
        assert_eq!(target.get_property("title"), Some(json!("Delegated")));
    }

    #[test]
    fn test_adjust_to_context_requires_target_values() {
        let mut node = record("/a");
        let declared = DimensionRequest::new().with("language", ["de", "en"]);

        let mut targets = BTreeMap::new();
        let err = node
            .adjust_to_context("user-1", &declared, &targets)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNodeContext { .. }));

        targets.insert("language".to_string(), "de".to_string());
        node.adjust_to_context("user-1", &declared, &targets).unwrap();
        assert_eq!(node.workspace_name(), "user-1");
        assert!(node.dimensions().contains("language", "de"));
        assert!(!node.dimensions().contains("language", "en"));
        assert_eq!(
            node.dimensions_hash(),
            DimensionValues::new().with("language", ["de"]).hash()
        );
    }

    #[test]
    fn test_matches_workspace_and_dimensions() {
        let node = NodeRecord::new(
            "/a",
            "live",
            None,
            Some(DimensionValues::new().with("lang", ["en", "de"])),
        )
        .unwrap();

        assert!(node.matches_workspace_and_dimensions("live", None));
        assert!(!node.matches_workspace_and_dimensions("user-1", None));
        assert!(node.matches_workspace_and_dimensions(
            "live",
            Some(&DimensionRequest::new().with("lang", ["de"]))
        ));
        assert!(!node.matches_workspace_and_dimensions(
            "live",
            Some(&DimensionRequest::new().with("lang", ["fr"]))
        ));
    }

    #[test]
    fn test_visibility_window() {
        let now = Utc::now();
        let mut node = record("/a");
        assert!(node.is_visible());
        assert!(node.is_visible_at(now));

        node.hidden_before_date_time = Some(now + Duration::hours(1));
        assert!(node.is_visible());
        assert!(!node.is_visible_at(now));
        assert!(node.is_visible_at(now + Duration::hours(2)));

        node.hidden_before_date_time = None;
        node.hidden_after_date_time = Some(now - Duration::hours(1));
        assert!(!node.is_visible_at(now));

        node.hidden_after_date_time = None;
        node.hidden = true;
        assert!(!node.is_visible());
        assert!(!node.is_visible_at(now));
    }

    #[test]
    fn test_accessibility() {
        let mut node = record("/a");
        let guest = RoleSet::new(["Guest"]);
        let editor = RoleSet::new(["Editor"]);

        assert!(node.is_accessible(&guest));

        node.access_roles = vec![EVERYBODY_ROLE.to_string()];
        assert!(!node.has_access_restrictions());
        assert!(node.is_accessible(&guest));

        node.access_roles = vec!["Editor".to_string(), "Admin".to_string()];
        assert!(node.has_access_restrictions());
        assert!(!node.is_accessible(&guest));
        assert!(node.is_accessible(&editor));
    }

    #[test]
    fn test_label_prefers_title_then_text() {
        let mut node = record("/a/about");
        node.node_type = "page".to_string();
        assert_eq!(node.label(), "(page) about");

        node.set_property("text", json!("<p>Some text</p>"));
        assert_eq!(node.label(), "Some text");

        node.set_property("title", json!("<b>About us</b>"));
        assert_eq!(node.label(), "About us");
    }

    #[test]
    fn test_label_is_cropped() {
        let mut node = record("/a");
        node.set_property("title", json!("A title that is clearly longer than thirty characters"));
        let label = node.label();
        assert!(label.ends_with(" …"));
        assert_eq!(label.chars().count(), LABEL_MAXIMUM_CHARACTERS + 2);
    }

    #[test]
    fn test_copy_for_workspace_keeps_identity() {
        let mut source = record("/a");
        source.set_property("title", json!("x"));
        source.set_version(3);
        source.set_removed_flag(true);

        let copy = source.copy_for_workspace("user-1");
        assert_ne!(copy.persistence_id(), source.persistence_id());
        assert_eq!(copy.identifier(), source.identifier());
        assert_eq!(copy.path(), "/a");
        assert_eq!(copy.workspace_name(), "user-1");
        assert_eq!(copy.version(), 0);
        assert!(!copy.is_removed());
        assert_eq!(copy.get_property("title"), Some(json!("x")));
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let node = record("/a");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["path"], "/a");
        assert_eq!(value["parentPath"], "/");
        assert!(value.get("persistenceId").is_some());
        assert!(value.get("dimensionsHash").is_some());
    }
}

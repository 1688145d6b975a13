//! Context Tests
//!
//! Workspace resolution, visibility filtering, dimension fallback and
//! adoption of base workspace records.

#[cfg(test)]
mod context_tests {
    use crate::config::{ContentDimensionConfiguration, ContentRepositoryConfig};
    use crate::models::{DimensionRequest, NodeRecord};
    use crate::services::{
        ContentRepository, ContentRepositoryError, ContextProperties, NodePathRef, RoleSet,
    };
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn repository() -> ContentRepository {
        ContentRepository::in_memory(ContentRepositoryConfig::default()).unwrap()
    }

    fn repository_with_language() -> ContentRepository {
        let mut config = ContentRepositoryConfig::default();
        config.content_dimensions.insert(
            "language".to_string(),
            ContentDimensionConfiguration {
                default: "en".to_string(),
                fallbacks: Vec::new(),
            },
        );
        ContentRepository::in_memory(config).unwrap()
    }

    #[tokio::test]
    async fn test_get_workspace_creates_branch_on_live() {
        let repository = repository();
        let mut context = repository.create_context("user-admin");

        let workspace = context.get_workspace(true).await.unwrap().unwrap();
        assert_eq!(workspace.name(), "user-admin");
        assert_eq!(workspace.base_workspace().map(|b| b.name()), Some("live"));

        let memoized = context.get_workspace(false).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&workspace, &memoized));

        let live = repository.workspace_service().get_workspace("live").await.unwrap();
        assert!(live.is_some_and(|live| !live.has_base_workspace()));
    }

    #[tokio::test]
    async fn test_get_workspace_without_create() {
        let repository = repository();
        let mut context = repository.create_context("nobody");
        assert!(context.get_workspace(false).await.unwrap().is_none());

        let mut live = repository.create_context("live");
        let workspace = live.get_workspace(true).await.unwrap().unwrap();
        assert!(!workspace.has_base_workspace());
    }

    #[tokio::test]
    async fn test_get_node_requires_absolute_path() {
        let repository = repository();
        let mut context = repository.create_context("live");

        assert!(matches!(
            context.get_node("about").await,
            Err(ContentRepositoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            context.get_node("/a//b").await,
            Err(ContentRepositoryError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_and_resolve_nodes() {
        let repository = repository();
        let mut context = repository.create_context("live");

        let root = context.get_root_node().await.unwrap();
        let sites = context.create_node(&root, "sites", None).await.unwrap();
        let home = context.create_node(&sites, "home", None).await.unwrap();

        let found = context.get_node("/sites/home").await.unwrap().unwrap();
        assert_eq!(found.identifier(), home.identifier());
        assert_eq!(
            context.get_node("/sites/./home/../home").await.unwrap().unwrap().path(),
            "/sites/home"
        );

        let by_id = context
            .get_node_by_identifier(sites.identifier())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.path(), "/sites");

        let on_path = context
            .get_nodes_on_path(NodePathRef::Path("/sites"), NodePathRef::Node(&home))
            .await
            .unwrap();
        let paths: Vec<&str> = on_path.iter().map(NodeRecord::path).collect();
        assert_eq!(paths, vec!["/sites", "/sites/home"]);

        let children = context.get_child_nodes(&root, None).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "sites");
    }

    #[tokio::test]
    async fn test_context_path() {
        let repository = repository();
        let mut context = repository.create_context("user-admin");

        assert!(matches!(
            context.context_path(),
            Err(ContentRepositoryError::InvalidArgument(_))
        ));

        let root = context.get_root_node().await.unwrap();
        let about = context.create_node(&root, "about", None).await.unwrap();
        context.set_current_node(Some(about));
        assert_eq!(context.context_path().unwrap(), "user-admin/about");
    }

    #[tokio::test]
    async fn test_remove_node_in_branch_hides_it() {
        let repository = repository();
        let mut live = repository.create_context("live");
        let live_root = live.get_root_node().await.unwrap();
        live.create_node(&live_root, "news", None).await.unwrap();

        let mut context = repository.create_context("user-admin");
        let news = context.get_node("/news").await.unwrap().unwrap();
        assert_eq!(news.workspace_name(), "live");

        context.remove_node(&news).await.unwrap();
        assert!(context.get_node("/news").await.unwrap().is_none());
        assert!(live.get_node("/news").await.unwrap().is_some());

        let mut showing_removed = repository.create_context_with(
            ContextProperties::new("user-admin").removed_content_shown(true),
        );
        let tombstone = showing_removed.get_node("/news").await.unwrap().unwrap();
        assert!(tombstone.is_removed());
        assert_eq!(tombstone.workspace_name(), "user-admin");
    }

    #[tokio::test]
    async fn test_hidden_nodes_and_time_window() {
        let repository = repository();
        let mut context = repository.create_context("live");
        let root = context.get_root_node().await.unwrap();

        let mut hidden = context.create_node(&root, "hidden", None).await.unwrap();
        hidden.hidden = true;
        repository.node_service().persist(hidden).await.unwrap();

        let now = Utc::now();
        let mut scheduled = context.create_node(&root, "scheduled", None).await.unwrap();
        scheduled.hidden_before_date_time = Some(now + Duration::days(1));
        repository.node_service().persist(scheduled).await.unwrap();

        assert!(context.get_node("/hidden").await.unwrap().is_none());
        assert!(context.get_node("/scheduled").await.unwrap().is_none());

        context.set_current_date_time(now + Duration::days(2));
        assert!(context.get_node("/scheduled").await.unwrap().is_some());

        let mut showing_hidden = repository.create_context_with(
            ContextProperties::new("live").invisible_content_shown(true),
        );
        assert!(showing_hidden.get_node("/hidden").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_access_roles_filter_nodes() {
        let repository = repository();
        let mut context = repository.create_context("live");
        let root = context.get_root_node().await.unwrap();

        let mut internal = context.create_node(&root, "internal", None).await.unwrap();
        internal.access_roles = vec!["Editor".to_string()];
        repository.node_service().persist(internal).await.unwrap();

        assert!(context.get_node("/internal").await.unwrap().is_none());

        let mut showing = repository.create_context_with(
            ContextProperties::new("live").inaccessible_content_shown(true),
        );
        assert!(showing.get_node("/internal").await.unwrap().is_some());

        let editor = repository
            .clone()
            .with_security(Arc::new(RoleSet::new(["Editor"])));
        let mut editor_context = editor.create_context("live");
        assert!(editor_context.get_node("/internal").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_child_type_filter_includes_sub_types() {
        let mut config = ContentRepositoryConfig::default();
        config.node_types = serde_json::from_value(json!({
            "document": {},
            "page": { "superTypes": ["document"] },
            "text": {}
        }))
        .unwrap();
        let repository = ContentRepository::in_memory(config).unwrap();
        let mut context = repository.create_context("live");
        let root = context.get_root_node().await.unwrap();

        context.create_node(&root, "doc", Some("document")).await.unwrap();
        context.create_node(&root, "page", Some("page")).await.unwrap();
        context.create_node(&root, "text", Some("text")).await.unwrap();

        let documents = context.get_child_nodes(&root, Some("document")).await.unwrap();
        let names: Vec<&str> = documents.iter().map(NodeRecord::name).collect();
        assert_eq!(names, vec!["doc", "page"]);
    }

    #[tokio::test]
    async fn test_root_resolves_with_dimensions_configured() {
        let repository = repository_with_language();
        let mut context = repository.create_context("live");
        let root = context.get_root_node().await.unwrap();
        let about = context.create_node(&root, "about", None).await.unwrap();

        let found = context.get_node("/").await.unwrap().unwrap();
        assert_eq!(found.persistence_id(), root.persistence_id());
        let parent = context.get_node("/about/..").await.unwrap().unwrap();
        assert_eq!(parent.persistence_id(), root.persistence_id());

        let on_path = context
            .get_nodes_on_path(NodePathRef::Path("/"), NodePathRef::Node(&about))
            .await
            .unwrap();
        let paths: Vec<&str> = on_path.iter().map(NodeRecord::path).collect();
        assert_eq!(paths, vec!["/", "/about"]);

        // A branch resolves its own root
        let mut branch = repository.create_context("user-admin");
        let branch_root = branch.get_node("/").await.unwrap().unwrap();
        assert_eq!(branch_root.workspace_name(), "user-admin");
    }

    #[tokio::test]
    async fn test_dimension_fallback_and_adoption() {
        let repository = repository_with_language();

        let mut english = repository.create_context("live");
        assert_eq!(
            english.dimensions(),
            &DimensionRequest::new().with("language", ["en"])
        );
        let root = english.get_root_node().await.unwrap();
        let about = english.create_node(&root, "about", None).await.unwrap();
        assert!(about.dimensions().contains("language", "en"));

        let mut german = repository.create_context_with(
            ContextProperties::new("live")
                .dimensions(DimensionRequest::new().with("language", ["de", "en"]))
                .target_dimensions(BTreeMap::from([(
                    "language".to_string(),
                    "de".to_string(),
                )])),
        );

        // Falls back to English until a German variant exists
        let fallback = german.get_node("/about").await.unwrap().unwrap();
        assert_eq!(fallback.persistence_id(), about.persistence_id());

        let translated = german.adopt_node(&fallback).await.unwrap();
        assert_ne!(translated.persistence_id(), about.persistence_id());
        assert_eq!(translated.identifier(), about.identifier());
        assert!(translated.dimensions().contains("language", "de"));

        let resolved = german.get_node("/about").await.unwrap().unwrap();
        assert_eq!(resolved.persistence_id(), translated.persistence_id());
        let still_english = english.get_node("/about").await.unwrap().unwrap();
        assert_eq!(still_english.persistence_id(), about.persistence_id());
    }

    #[tokio::test]
    async fn test_adopt_requires_target_for_every_dimension() {
        let repository = repository();
        let mut live = repository.create_context("live");
        let root = live.get_root_node().await.unwrap();
        let about = live.create_node(&root, "about", None).await.unwrap();

        let mut context = repository.create_context_with(
            ContextProperties::new("user-admin")
                .dimensions(DimensionRequest::new().with("language", ["de"]))
                .target_dimensions(BTreeMap::new()),
        );
        assert!(matches!(
            context.adopt_node(&about).await,
            Err(ContentRepositoryError::InvalidNodeContext(_))
        ));
    }
}

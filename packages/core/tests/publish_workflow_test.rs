//! Publish Workflow Tests
//!
//! End-to-end editing through contexts: changes made in a personal workspace
//! stay invisible in live until the workspace is published.

#[cfg(test)]
mod publish_workflow_tests {
    use anyhow::Result;
    use contentrepo_core::config::ContentRepositoryConfig;
    use contentrepo_core::models::path::{normalize_path, path_depth};
    use contentrepo_core::services::{ContentRepository, ContentRepositoryError};
    use serde_json::json;

    fn repository() -> Result<ContentRepository> {
        Ok(ContentRepository::in_memory(ContentRepositoryConfig::default())?)
    }

    #[tokio::test]
    async fn test_user_workspace_publish_to_live() -> Result<()> {
        let repository = repository()?;
        let mut user = repository.create_context("user-1");
        let workspace = user.get_workspace(true).await?.expect("created");
        let baseline = repository.workspace_service().get_node_count(&workspace).await?;
        assert_eq!(baseline, 1);

        let root = user.get_root_node().await?;
        let site = user.create_node(&root, "site", None).await?;
        let page = user.create_node(&site, "page", None).await?;
        assert_eq!(page.path(), "/site/page");

        let mut live = repository.create_context("live");
        assert!(live.get_node("/site/page").await?.is_none());

        let published = repository
            .workspace_service()
            .publish(&workspace, "live")
            .await?;
        assert_eq!(published, 2);

        let in_live = live.get_node("/site/page").await?.expect("published");
        assert_eq!(in_live.identifier(), page.identifier());
        assert_eq!(in_live.workspace_name(), "live");
        assert_eq!(
            repository.workspace_service().get_node_count(&workspace).await?,
            baseline
        );

        // The user workspace still sees the page through its base
        assert!(user.get_node("/site/page").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_edit_publish_cycle_on_live_content() -> Result<()> {
        let repository = repository()?;
        let mut live = repository.create_context("live");
        let live_root = live.get_root_node().await?;
        let mut about = live.create_node(&live_root, "about", None).await?;
        about.set_property("title", json!("About us"));
        repository.node_service().persist(about).await?;

        let mut editor = repository.create_context("user-editor");
        let seen = editor.get_node("/about").await?.expect("inherited from live");
        let mut draft = editor.adopt_node(&seen).await?;
        assert_eq!(draft.workspace_name(), "user-editor");
        draft.set_property("title", json!("About the team"));
        repository.node_service().persist(draft).await?;

        let title = |node: Option<contentrepo_core::NodeRecord>| {
            node.and_then(|n| n.get_property("title"))
        };
        assert_eq!(title(live.get_node("/about").await?), Some(json!("About us")));
        assert_eq!(
            title(editor.get_node("/about").await?),
            Some(json!("About the team"))
        );

        let workspace = editor.get_workspace(false).await?.expect("exists");
        repository
            .workspace_service()
            .publish(&workspace, "live")
            .await?;

        assert_eq!(
            title(live.get_node("/about").await?),
            Some(json!("About the team"))
        );
        let live_records = repository.node_records().find_by_workspace("live").await?;
        assert_eq!(live_records.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_removal_is_published_as_deletion() -> Result<()> {
        let repository = repository()?;
        let mut live = repository.create_context("live");
        let live_root = live.get_root_node().await?;
        let news = live.create_node(&live_root, "news", None).await?;
        live.create_node(&news, "2024", None).await?;

        let mut editor = repository.create_context("user-editor");
        let seen = editor.get_node("/news").await?.expect("inherited from live");
        editor.remove_node(&seen).await?;
        assert!(editor.get_node("/news/2024").await?.is_none());
        assert!(live.get_node("/news/2024").await?.is_some());

        let workspace = editor.get_workspace(false).await?.expect("exists");
        repository
            .workspace_service()
            .publish(&workspace, "live")
            .await?;

        assert!(live.get_node("/news").await?.is_none());
        assert!(live.get_node("/news/2024").await?.is_none());
        let live_records = repository.node_records().find_by_workspace("live").await?;
        assert_eq!(live_records.len(), 1);
        assert!(live_records.iter().all(|record| !record.is_removed()));

        Ok(())
    }

    #[tokio::test]
    async fn test_rename_in_branch_then_publish() -> Result<()> {
        let repository = repository()?;
        let mut live = repository.create_context("live");
        let live_root = live.get_root_node().await?;
        let a = live.create_node(&live_root, "a", None).await?;
        let b = live.create_node(&a, "b", None).await?;

        let mut editor = repository.create_context("user-editor");
        let seen = editor.get_node("/a").await?.expect("inherited from live");
        let own = editor.adopt_node(&seen).await?;
        repository.node_service().set_path(&own, "/x", true).await?;

        assert!(editor.get_node("/x/b").await?.is_some());
        assert!(editor.get_node("/a/b").await?.is_none());
        assert!(live.get_node("/a/b").await?.is_some());

        let workspace = editor.get_workspace(false).await?.expect("exists");
        assert_eq!(
            repository
                .workspace_service()
                .publish(&workspace, "live")
                .await?,
            2
        );

        let moved = live.get_node("/x/b").await?.expect("published");
        assert_eq!(moved.identifier(), b.identifier());
        assert!(live.get_node("/a").await?.is_none());
        assert!(live.get_node("/a/b").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_publish_to_own_workspace_is_rejected() -> Result<()> {
        let repository = repository()?;
        let mut editor = repository.create_context("user-editor");
        let workspace = editor.get_workspace(true).await?.expect("created");

        let result = repository
            .workspace_service()
            .publish(&workspace, "user-editor")
            .await;
        assert!(matches!(
            result,
            Err(ContentRepositoryError::NotABaseWorkspace { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_path_properties() -> Result<()> {
        for path in ["/", "/a", "/a/b", "/sites/example/home"] {
            let expected = if path == "/" {
                0
            } else {
                path.matches('/').count()
            };
            assert_eq!(path_depth(path), expected);
        }

        assert_eq!(normalize_path("/sites/home", ".")?, "/sites/home");
        assert!(normalize_path("/sites", "a//b").is_err());
        Ok(())
    }
}

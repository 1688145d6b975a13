//! Repository Configuration
//!
//! Settings of a content repository instance, loadable from JSON:
//!
//! ```json
//! {
//!   "liveWorkspaceName": "live",
//!   "maxPathLength": 4000,
//!   "contentDimensions": {
//!     "language": { "default": "en", "fallbacks": ["mul"] }
//!   },
//!   "nodeTypes": {
//!     "page": { "childNodes": { "main": { "type": "collection" } } }
//!   }
//! }
//! ```
//!
//! Every field is optional. `with_env_overrides` lets the environment replace
//! the live workspace name (`CONTENTREPO_LIVE_WORKSPACE`) and the maximum path
//! length (`CONTENTREPO_MAX_PATH_LENGTH`).

use crate::models::path::DEFAULT_MAX_PATH_LENGTH;
use crate::models::{DimensionRequest, NodeTypeConfiguration};
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the base-less workspace everything is published to
pub const DEFAULT_LIVE_WORKSPACE_NAME: &str = "live";

/// Capacity of the domain event broadcast channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Maximum records touched by one rename or removal cascade
pub const DEFAULT_CASCADE_LIMIT: usize = 10_000;

const ENV_LIVE_WORKSPACE: &str = "CONTENTREPO_LIVE_WORKSPACE";
const ENV_MAX_PATH_LENGTH: &str = "CONTENTREPO_MAX_PATH_LENGTH";

/// Configuration of one content dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDimensionConfiguration {
    /// Value targeted by new contexts
    pub default: String,

    /// Values accepted after the default, in order
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

/// Content repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentRepositoryConfig {
    pub live_workspace_name: String,
    pub max_path_length: usize,
    pub event_channel_capacity: usize,
    pub cascade_limit: usize,
    pub content_dimensions: BTreeMap<String, ContentDimensionConfiguration>,
    pub node_types: BTreeMap<String, NodeTypeConfiguration>,
}

impl Default for ContentRepositoryConfig {
    fn default() -> Self {
        Self {
            live_workspace_name: DEFAULT_LIVE_WORKSPACE_NAME.to_string(),
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            cascade_limit: DEFAULT_CASCADE_LIMIT,
            content_dimensions: BTreeMap::new(),
            node_types: BTreeMap::new(),
        }
    }
}

impl ContentRepositoryConfig {
    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse content repository configuration")
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(name) = lookup(ENV_LIVE_WORKSPACE).filter(|name| !name.is_empty()) {
            self.live_workspace_name = name;
        }
        if let Some(length) = lookup(ENV_MAX_PATH_LENGTH).and_then(|v| v.parse().ok()) {
            self.max_path_length = length;
        }
        self
    }

    /// Dimension request of a new context: `[default, ...fallbacks]` per dimension
    pub fn default_dimension_request(&self) -> DimensionRequest {
        self.content_dimensions
            .iter()
            .fold(DimensionRequest::new(), |request, (name, dimension)| {
                let values = std::iter::once(dimension.default.clone())
                    .chain(dimension.fallbacks.iter().cloned());
                request.with(name.clone(), values)
            })
    }

    /// Target value per dimension of a new context
    pub fn default_target_dimensions(&self) -> BTreeMap<String, String> {
        self.content_dimensions
            .iter()
            .map(|(name, dimension)| (name.clone(), dimension.default.clone()))
            .collect()
    }
}

//! Node Path Utilities
//!
//! Pure functions for validating, normalizing and decomposing absolute node
//! paths such as `/sites/example/home`.
//!
//! # Grammar
//!
//! - A path is either exactly `/` (the root) or one or more `/segment` parts
//! - A segment consists of ASCII letters, digits and `-` (case-insensitive)
//! - Depth is the number of segments; the root has depth 0 and an empty name
//!
//! Node *names* (used when creating children) are validated separately and are
//! more permissive than path segments, see [`validate_node_name`].

use crate::models::ValidationError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Absolute path of the root node
pub const ROOT_PATH: &str = "/";

/// Default maximum length of a stored path
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4000;

// Regex pattern for absolute node paths
const PATH_PATTERN: &str = r"(?i)^(/|(/[a-z0-9-]+)+)$";

// Characters not allowed in node names (plus whitespace control characters)
const FORBIDDEN_NAME_CHARACTERS: &[char] = &['/', ':', '[', ']', '*', '|'];

fn path_regex() -> &'static Regex {
    static PATH_REGEX: OnceLock<Regex> = OnceLock::new();
    PATH_REGEX.get_or_init(|| Regex::new(PATH_PATTERN).unwrap())
}

/// Check whether `path` matches the absolute path grammar
///
/// # Examples
///
/// ```
/// # use contentrepo_core::models::path::is_valid_path;
/// assert!(is_valid_path("/"));
/// assert!(is_valid_path("/sites/Example-1"));
/// assert!(!is_valid_path("sites/example"));
/// assert!(!is_valid_path("/sites//example"));
/// assert!(!is_valid_path("/sites/"));
/// ```
pub fn is_valid_path(path: &str) -> bool {
    path_regex().is_match(path)
}

/// Validate `path` against the grammar and a maximum length
pub fn validate_path(path: &str, max_length: usize) -> Result<(), ValidationError> {
    if path.len() > max_length {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: format!("path exceeds {} characters", max_length),
        });
    }
    if !is_valid_path(path) {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "a path must be absolute and contain only letters, digits and '-'"
                .to_string(),
        });
    }
    Ok(())
}

/// Validate a node name used for child creation
///
/// A name must be non-empty, must not be exactly `.`, and must not contain
/// any of `/ : [ ] * |` or whitespace control characters.
pub fn validate_node_name(name: &str) -> Result<(), ValidationError> {
    let invalid = name.is_empty()
        || name == "."
        || name
            .chars()
            .any(|c| FORBIDDEN_NAME_CHARACTERS.contains(&c) || matches!(c, '\t' | '\n' | '\r'));

    if invalid {
        return Err(ValidationError::InvalidNodeName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Resolve `path` against `base_path`
///
/// Absolute inputs ignore the base. `.` segments are dropped and `..`
/// segments remove the preceding segment. A `..` at the root stays at the
/// root. Inputs containing `//` are rejected.
///
/// # Examples
///
/// ```
/// # use contentrepo_core::models::path::normalize_path;
/// assert_eq!(normalize_path("/a/b", ".").unwrap(), "/a/b");
/// assert_eq!(normalize_path("/a/b", "../c").unwrap(), "/a/c");
/// assert_eq!(normalize_path("/", "x/./y").unwrap(), "/x/y");
/// assert!(normalize_path("/a", "b//c").is_err());
/// ```
pub fn normalize_path(base_path: &str, path: &str) -> Result<String, ValidationError> {
    if path == "." {
        return Ok(base_path.to_string());
    }
    if path.is_empty() {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "path must not be empty".to_string(),
        });
    }
    if path.contains("//") {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "paths must not contain two consecutive slashes".to_string(),
        });
    }

    let absolute = if path.starts_with('/') {
        path.to_string()
    } else if base_path == ROOT_PATH {
        format!("/{}", path)
    } else {
        format!("{}/{}", base_path, path)
    };

    let mut segments: Vec<&str> = Vec::new();
    let raw: Vec<&str> = absolute.split('/').collect();
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
        i += 1;
    }

    if segments.is_empty() {
        Ok(ROOT_PATH.to_string())
    } else {
        Ok(format!("/{}", segments.join("/")))
    }
}

/// Join a parent path and a child name
pub fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path == ROOT_PATH {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent_path, name)
    }
}

/// Parent path of `path`; empty for the root
pub fn parent_path(path: &str) -> String {
    if path == ROOT_PATH {
        return String::new();
    }
    match path.rfind('/') {
        Some(0) | None => ROOT_PATH.to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}

/// Last segment of `path`; empty for the root
pub fn node_name(path: &str) -> &str {
    if path == ROOT_PATH {
        return "";
    }
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Number of segments in `path`; the root has depth 0
pub fn path_depth(path: &str) -> usize {
    if path == ROOT_PATH {
        0
    } else {
        path.matches('/').count()
    }
}

/// Whether `path` lies strictly below `ancestor`
pub fn is_descendant_of(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT_PATH {
        return path != ROOT_PATH && path.starts_with('/');
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Hex-encoded SHA-256 of the path, used in the path uniqueness key
pub fn path_hash(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

//! Loader Options
//!
//! Host-facing configuration. Every field has a default so a host can pass a
//! partial JSON object across the native boundary.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

pub const DEFAULT_EXTENSION: &str = "svg";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_RPC_EVENT_NAME: &str = "nuxt-svgo-loader:devtools:rpc";

/// Directory names never descended into while scanning for assets.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "coverage",
    "test",
    "tests",
    ".nuxt",
    ".output",
    ".git",
];

/// One directory scanned for icon assets, optionally namespaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRoot {
    pub dir: PathBuf,
    #[serde(default)]
    pub prefix: String,
}

impl AssetRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    pub roots: Vec<AssetRoot>,
    pub extension: String,
    pub ignore_dirs: Vec<String>,
    /// Strategy used when an icon has no (or an unknown) `strategy` attribute.
    pub default_strategy: String,
    /// Regex patterns of module ids that are always transformed.
    pub include: Vec<String>,
    /// Regex patterns of module ids that are never transformed.
    pub exclude: Vec<String>,
    pub debounce_ms: u64,
    pub rpc_timeout_ms: u64,
    pub rpc_event_name: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
            default_strategy: "component".to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            rpc_event_name: DEFAULT_RPC_EVENT_NAME.to_string(),
        }
    }
}

impl LoaderOptions {
    pub fn from_json(json: &str) -> Result<Self, LoaderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_root(mut self, root: AssetRoot) -> Self {
        self.roots.push(root);
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = LoaderOptions::from_json(
            r#"{ "roots": [{ "dir": "/app/assets", "prefix": "ui" }], "debounceMs": 50 }"#,
        )
        .unwrap();

        assert_eq!(options.roots, vec![AssetRoot::with_prefix("/app/assets", "ui")]);
        assert_eq!(options.debounce(), Duration::from_millis(50));
        assert_eq!(options.extension, "svg");
        assert_eq!(options.default_strategy, "component");
        assert!(options.ignore_dirs.iter().any(|d| d == "node_modules"));
        assert_eq!(options.rpc_event_name, DEFAULT_RPC_EVENT_NAME);
    }

    #[test]
    fn test_root_prefix_is_optional() {
        let options = LoaderOptions::from_json(r#"{ "roots": [{ "dir": "icons" }] }"#).unwrap();
        assert_eq!(options.roots[0].prefix, "");
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            LoaderOptions::from_json("{ roots: "),
            Err(LoaderError::Options(_))
        ));
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Prefix of every cache generation name.
pub const DEFAULT_CACHE_PREFIX: &str = "net-control";

/// Bumping this is the only way to refresh installed assets.
pub const DEFAULT_CACHE_VERSION: &str = "v4";

const APP_SHELL: [&str; 7] = [
    "/",
    "/index.html",
    "/styles.css",
    "/script.js",
    "/manifest.json",
    "/img/icon-192.png",
    "/img/icon-512.png",
];

const CDN_ASSETS: [&str; 3] = [
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
];

/// Cross-origin hosts whose assets may be cached.
const CACHEABLE_HOSTS: [&str; 2] = ["cdn.jsdelivr.net", "cdnjs.cloudflare.com"];

/// The versioned list of assets installed into a cache generation.
///
/// Paths are resolved against the page origin; absolute URLs are taken as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheManifest {
    pub prefix: String,
    pub version: String,
    pub assets: Vec<String>,
    pub allow_list: Vec<String>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            version: DEFAULT_CACHE_VERSION.to_string(),
            assets: APP_SHELL
                .iter()
                .chain(CDN_ASSETS.iter())
                .map(|s| s.to_string())
                .collect(),
            allow_list: CACHEABLE_HOSTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CacheManifest {
    pub fn new(version: impl Into<String>, assets: Vec<String>, allow_list: Vec<String>) -> Self {
        Self {
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            version: version.into(),
            assets,
            allow_list,
        }
    }

    /// Name of the generation this manifest installs into, e.g. `net-control-v4`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.prefix, self.version)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse cache manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache manifest {}", path.display()))?;
        Self::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = CacheManifest::default();
        assert_eq!(manifest.cache_name(), "net-control-v4");
        assert_eq!(manifest.assets.len(), 10);
        assert!(manifest.assets.contains(&"/index.html".to_string()));
        assert_eq!(manifest.allow_list, vec!["cdn.jsdelivr.net", "cdnjs.cloudflare.com"]);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let manifest =
            CacheManifest::from_json(r#"{"version":"v5","assets":["/a.html"]}"#).unwrap();
        assert_eq!(manifest.cache_name(), "net-control-v5");
        assert_eq!(manifest.assets, vec!["/a.html"]);
        assert_eq!(manifest.allow_list.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(CacheManifest::from_json("[1,2").is_err());
    }
}

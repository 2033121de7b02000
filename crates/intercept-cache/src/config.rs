//! Routing, namespace and manifest configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How requests that fall through to the app-shell category are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShellStrategy {
    /// Never touch the cache; the request proceeds to the network untouched
    #[default]
    NetworkOnly,
    /// Serve a cached copy when present and refresh it in the background
    StaleWhileRevalidate,
}

impl FromStr for ShellStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network-only" => Ok(ShellStrategy::NetworkOnly),
            "stale-while-revalidate" => Ok(ShellStrategy::StaleWhileRevalidate),
            other => Err(format!("unknown shell strategy: {}", other)),
        }
    }
}

impl fmt::Display for ShellStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellStrategy::NetworkOnly => f.write_str("network-only"),
            ShellStrategy::StaleWhileRevalidate => f.write_str("stale-while-revalidate"),
        }
    }
}

/// Path-matching rules for request categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Any path containing one of these is a media request
    pub media_segments: Vec<String>,
    /// Paths starting with this are API requests
    pub api_prefix: String,
    pub shell_strategy: ShellStrategy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            media_segments: vec!["/downloads/".to_string(), "/api/download/".to_string()],
            api_prefix: "/api/".to_string(),
            shell_strategy: ShellStrategy::NetworkOnly,
        }
    }
}

/// Names of the two namespaces. Bumping a name starts a fresh namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNames {
    pub shell: String,
    pub media: String,
}

impl Default for NamespaceNames {
    fn default() -> Self {
        Self {
            shell: "shell-v2".to_string(),
            media: "media-v1".to_string(),
        }
    }
}

/// Ordered list of locators pre-populated into the shell namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    locators: Vec<String>,
}

impl AssetManifest {
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locators: locators.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a JSON array of locators
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn locators(&self) -> &[String] {
        &self.locators
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::new([
            "/static/index.html",
            "/static/login.html",
            "/static/manifest.json",
            "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
            "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.10.0/font/bootstrap-icons.css",
            "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
            "https://cdn.jsdelivr.net/npm/vue@3.2.47/dist/vue.global.prod.js",
            "https://cdn.jsdelivr.net/npm/axios/dist/axios.min.js",
        ])
    }
}

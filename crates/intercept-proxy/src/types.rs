//! Core types for the interception proxy

use intercept_cache::{CacheStats, NamespaceNames, RouterConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Which cache store backs the namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Entries persist under `cache_dir`
    File,
    /// Entries live for the lifetime of the process
    Memory,
}

/// Configuration for the interception proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    /// Origin every intercepted request is forwarded to
    pub upstream: Url,
    pub cache_dir: PathBuf,
    pub store_backend: StoreBackend,
    pub namespaces: NamespaceNames,
    pub router: RouterConfig,
    /// JSON array of locators; the built-in manifest is used when unset
    pub manifest_path: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            upstream: Url::parse("http://localhost:8000").expect("static URL"),
            cache_dir: PathBuf::from("./cache"),
            store_backend: StoreBackend::File,
            namespaces: NamespaceNames::default(),
            router: RouterConfig::default(),
            manifest_path: None,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Body of the explicit save and remove endpoints
#[derive(Debug, Deserialize)]
pub struct MediaRequest {
    /// Absolute URL or a path on the upstream
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SavedResponse {
    pub key: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

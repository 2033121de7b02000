//! Configuration from environment variables

use crate::error::{ProxyError, Result};
use crate::types::{ProxyConfig, StoreBackend};
use intercept_cache::AssetManifest;
use std::path::{Path, PathBuf};
use url::Url;

impl ProxyConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = ProxyConfig::default();

        if let Some(port) = lookup("PORT").and_then(|s| s.parse::<u16>().ok()) {
            config.port = port;
        }

        if let Some(upstream) = lookup("UPSTREAM_URL") {
            config.upstream = Url::parse(&upstream)
                .map_err(|e| ProxyError::Config(format!("UPSTREAM_URL {:?}: {}", upstream, e)))?;
        }

        if let Some(dir) = lookup("CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }

        if let Some(backend) = lookup("STORE_BACKEND") {
            config.store_backend = match backend.trim().to_ascii_lowercase().as_str() {
                "file" => StoreBackend::File,
                "memory" => StoreBackend::Memory,
                other => {
                    return Err(ProxyError::Config(format!("unknown STORE_BACKEND: {}", other)))
                }
            };
        }

        if let Some(name) = lookup("SHELL_CACHE_NAME") {
            config.namespaces.shell = name;
        }
        if let Some(name) = lookup("MEDIA_CACHE_NAME") {
            config.namespaces.media = name;
        }

        if let Some(segments) = lookup("MEDIA_SEGMENTS") {
            config.router.media_segments = split_list(&segments);
        }
        if let Some(prefix) = lookup("API_PREFIX") {
            config.router.api_prefix = prefix;
        }
        if let Some(strategy) = lookup("SHELL_STRATEGY") {
            config.router.shell_strategy = strategy.parse().map_err(ProxyError::Config)?;
        }

        config.manifest_path = lookup("MANIFEST_PATH").map(PathBuf::from);

        Ok(config)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the manifest file, or fall back to the built-in manifest
pub async fn load_manifest(path: Option<&Path>) -> Result<AssetManifest> {
    let Some(path) = path else {
        return Ok(AssetManifest::default());
    };

    let json = tokio::fs::read_to_string(path).await?;
    AssetManifest::from_json(&json)
        .map_err(|e| ProxyError::Config(format!("manifest {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use intercept_cache::ShellStrategy;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = ProxyConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.router.api_prefix, "/api/");
        assert_eq!(config.router.shell_strategy, ShellStrategy::NetworkOnly);
        assert_eq!(config.namespaces.shell, "shell-v2");
    }

    #[test]
    fn test_overrides() {
        let config = ProxyConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("UPSTREAM_URL", "http://backend:9000"),
            ("STORE_BACKEND", "Memory"),
            ("MEDIA_SEGMENTS", "/files/, ,/export/"),
            ("API_PREFIX", "/rpc/"),
            ("SHELL_STRATEGY", "stale-while-revalidate"),
            ("SHELL_CACHE_NAME", "shell-v3"),
            ("MANIFEST_PATH", "/etc/proxy/manifest.json"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.as_str(), "http://backend:9000/");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.router.media_segments, vec!["/files/", "/export/"]);
        assert_eq!(config.router.api_prefix, "/rpc/");
        assert_eq!(config.router.shell_strategy, ShellStrategy::StaleWhileRevalidate);
        assert_eq!(config.namespaces.shell, "shell-v3");
        assert_eq!(config.namespaces.media, "media-v1");
        assert_eq!(
            config.manifest_path,
            Some(PathBuf::from("/etc/proxy/manifest.json"))
        );
    }

    #[test]
    fn test_unparseable_port_keeps_default() {
        let config = ProxyConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap();
        assert_eq!(config.port, 3001);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ProxyConfig::from_lookup(lookup(&[("UPSTREAM_URL", "not a url")])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&[("STORE_BACKEND", "redis")])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&[("SHELL_STRATEGY", "cache-first")])).is_err());
    }

    #[tokio::test]
    async fn test_load_manifest() {
        assert_eq!(load_manifest(None).await.unwrap(), AssetManifest::default());

        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        tokio::fs::write(&path, r#"["/shell.html", "/manifest.json"]"#)
            .await
            .unwrap();
        let manifest = load_manifest(Some(&path)).await.unwrap();
        assert_eq!(manifest.locators(), ["/shell.html", "/manifest.json"]);

        tokio::fs::write(&path, "{}").await.unwrap();
        assert!(matches!(
            load_manifest(Some(&path)).await,
            Err(ProxyError::Config(_))
        ));
    }
}

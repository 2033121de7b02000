//! Shared handle to the two namespaces

use crate::config::NamespaceNames;
use crate::error::Result;
use crate::store::{CacheStore, NamespaceHandle};
use crate::types::{CacheKey, CacheStats, CachedResponse, InterceptedRequest};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Owns the store and knows which namespace is which.
///
/// Cloning is cheap; every clone talks to the same store.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    names: NamespaceNames,
    origin: Url,
}

impl CacheManager {
    /// `origin` decides which URLs are keyed by path alone, see [`CacheKey::for_url`]
    pub fn new(store: Arc<dyn CacheStore>, names: NamespaceNames, origin: Url) -> Self {
        Self {
            store,
            names,
            origin,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn names(&self) -> &NamespaceNames {
        &self.names
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub async fn shell(&self) -> Result<NamespaceHandle> {
        self.store.open(&self.names.shell).await
    }

    pub async fn media(&self) -> Result<NamespaceHandle> {
        self.store.open(&self.names.media).await
    }

    pub fn key_for(&self, request: &InterceptedRequest) -> CacheKey {
        CacheKey::for_url(&request.url, &self.origin)
    }

    /// Resolve a manifest locator against the origin
    pub fn resolve(&self, locator: &str) -> std::result::Result<Url, url::ParseError> {
        self.origin.join(locator)
    }

    pub fn key_for_locator(&self, locator: &str) -> std::result::Result<CacheKey, url::ParseError> {
        let url = self.resolve(locator)?;
        Ok(CacheKey::for_url(&url, &self.origin))
    }

    /// The explicit save action, and the only way anything enters the media
    /// namespace.
    pub async fn save_to_media(
        &self,
        request: &InterceptedRequest,
        response: &CachedResponse,
    ) -> Result<CacheKey> {
        let media = self.media().await?;
        let key = self.key_for(request);
        self.store.put(&media, &key, response).await?;
        info!(key = %key, size = response.body.len(), "Saved to media cache");
        Ok(key)
    }

    /// Returns whether an entry was removed
    pub async fn remove_from_media(&self, request: &InterceptedRequest) -> Result<bool> {
        let media = self.media().await?;
        let key = self.key_for(request);
        let removed = self.store.delete(&media, &key).await?;
        if removed {
            info!(key = %key, "Removed from media cache");
        }
        Ok(removed)
    }

    pub async fn media_keys(&self) -> Result<Vec<CacheKey>> {
        let media = self.media().await?;
        self.store.keys(&media).await
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }
}

//! In-memory store, used for ephemeral deployments and tests

use super::{CacheStore, NamespaceHandle};
use crate::error::Result;
use crate::types::{CacheKey, CacheStats, CachedResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

type Namespaces = HashMap<String, HashMap<CacheKey, CachedResponse>>;

#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<Namespaces>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, name: &str) -> Result<NamespaceHandle> {
        let handle = NamespaceHandle::validated(name)?;
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(handle.name().to_string()).or_default();
        Ok(handle)
    }

    async fn get(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<Option<CachedResponse>> {
        let found = {
            let namespaces = self.namespaces.read().await;
            namespaces.get(ns.name()).and_then(|entries| entries.get(key)).cloned()
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(found)
    }

    async fn put(
        &self,
        ns: &NamespaceHandle,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(ns.name().to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        debug!(namespace = ns.name(), key = %key, size = response.body.len(), "Stored entry");
        Ok(())
    }

    async fn delete(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces
            .get_mut(ns.name())
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, ns: &NamespaceHandle) -> Result<Vec<CacheKey>> {
        let namespaces = self.namespaces.read().await;
        let mut keys: Vec<CacheKey> = namespaces
            .get(ns.name())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn stats(&self) -> CacheStats {
        let namespaces = self.namespaces.read().await;
        CacheStats {
            namespaces: namespaces.len(),
            entries: namespaces.values().map(HashMap::len).sum(),
            total_size: namespaces
                .values()
                .flat_map(|entries| entries.values())
                .map(|r| r.body.len() as u64)
                .sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

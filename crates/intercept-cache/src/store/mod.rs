//! Cache store collaborator
//!
//! A store holds any number of named namespaces, each mapping a [`CacheKey`]
//! to a [`CachedResponse`]. Implementations must tolerate concurrent reads and
//! writes from many request handlers; nothing above this layer takes locks.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{Result, StoreError};
use crate::types::{CacheKey, CacheStats, CachedResponse};
use async_trait::async_trait;

/// Handle to an opened namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceHandle {
    name: String,
}

impl NamespaceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace names double as directory names for the file store, so they
    /// are restricted to a conservative character set.
    pub(crate) fn validated(name: &str) -> Result<Self> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !valid {
            return Err(StoreError::InvalidNamespace(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a namespace, creating it on first use
    async fn open(&self, name: &str) -> Result<NamespaceHandle>;

    async fn get(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<Option<CachedResponse>>;

    /// Insert or overwrite an entry
    async fn put(&self, ns: &NamespaceHandle, key: &CacheKey, response: &CachedResponse)
        -> Result<()>;

    /// Remove an entry, returning whether it existed
    async fn delete(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<bool>;

    async fn keys(&self, ns: &NamespaceHandle) -> Result<Vec<CacheKey>>;

    async fn stats(&self) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_names() {
        assert!(NamespaceHandle::validated("shell-v2").is_ok());
        assert!(NamespaceHandle::validated("media_v1.0").is_ok());
        assert!(NamespaceHandle::validated("").is_err());
        assert!(NamespaceHandle::validated("..").is_err());
        assert!(NamespaceHandle::validated("a/b").is_err());
        assert!(NamespaceHandle::validated("media v1").is_err());
    }
}

//! Recording fakes for the store and network collaborators

use crate::error::{NetworkError, Result, StoreError};
use crate::network::Network;
use crate::store::{CacheStore, MemoryStore, NamespaceHandle};
use crate::types::{CacheKey, CacheStats, CachedResponse, InterceptedRequest};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A [`MemoryStore`] that counts calls and can be told to fail writes
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    failing_keys: Mutex<HashSet<CacheKey>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every put for `key` fail, in any namespace
    pub fn fail_puts_for(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(CacheKey::from(key));
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total get, put and delete calls
    pub fn calls(&self) -> usize {
        self.gets() + self.puts() + self.deletes()
    }

    /// Read without being recorded
    pub async fn peek(&self, ns: &str, key: &str) -> Option<CachedResponse> {
        let handle = self.inner.open(ns).await.ok()?;
        self.inner.get(&handle, &CacheKey::from(key)).await.ok()?
    }

    /// Write without being recorded
    pub async fn seed(&self, ns: &str, key: &str, response: CachedResponse) {
        let handle = self.inner.open(ns).await.unwrap();
        self.inner
            .put(&handle, &CacheKey::from(key), &response)
            .await
            .unwrap();
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn open(&self, name: &str) -> Result<NamespaceHandle> {
        self.inner.open(name).await
    }

    async fn get(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<Option<CachedResponse>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(ns, key).await
    }

    async fn put(
        &self,
        ns: &NamespaceHandle,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(StoreError::from(std::io::Error::other("disk full")));
        }
        self.inner.put(ns, key, response).await
    }

    async fn delete(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(ns, key).await
    }

    async fn keys(&self, ns: &NamespaceHandle) -> Result<Vec<CacheKey>> {
        self.inner.keys(ns).await
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}

enum Reply {
    Respond(CachedResponse),
    Fail(String),
}

/// Scripted network keyed by absolute URL.
///
/// Unscripted URLs answer 404.
#[derive(Default)]
pub struct FakeNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: CachedResponse) -> Self {
        self.set_response(url, response);
        self
    }

    pub fn fail(self, url: &str, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Fail(message.to_string()));
        self
    }

    pub fn set_response(&self, url: &str, response: CachedResponse) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Respond(response));
    }

    /// URLs fetched so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(
        &self,
        request: &InterceptedRequest,
    ) -> std::result::Result<CachedResponse, NetworkError> {
        let url = request.url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());

        match self.replies.lock().unwrap().get(&url) {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail(message)) => Err(NetworkError::Unreachable(message.clone())),
            None => Ok(CachedResponse::new(404, "not found")),
        }
    }
}

//! File-backed store
//!
//! Each namespace is a directory under the store root. Each entry is one file
//! named by the SHA-256 of its key, holding a JSON [`CacheEntry`] header line
//! followed by the raw body. Entries are written to a temp file and renamed
//! into place, so a reader sees either the old entry or the new one.

use super::{CacheStore, NamespaceHandle};
use crate::error::{Result, StoreError};
use crate::types::{CacheEntry, CacheKey, CacheStats, CachedResponse};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "entry";

/// A persistent store that survives process restarts
pub struct FileStore {
    /// Directory holding one subdirectory per namespace
    root: PathBuf,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
    /// Disambiguates temp files of concurrent writers
    write_seq: AtomicU64,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            write_seq: AtomicU64::new(0),
        }
    }

    /// Ensure the root directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!(root = ?self.root, "File store initialized");
        Ok(())
    }

    /// File name for a key, hex SHA-256
    pub fn entry_name(key: &CacheKey) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_str().as_bytes());
        format!("{}.{}", hex::encode(hasher.finalize()), ENTRY_EXTENSION)
    }

    fn namespace_dir(&self, ns: &NamespaceHandle) -> PathBuf {
        self.root.join(ns.name())
    }

    fn entry_path(&self, ns: &NamespaceHandle, key: &CacheKey) -> PathBuf {
        self.namespace_dir(ns).join(Self::entry_name(key))
    }

    async fn read_entry(path: &Path) -> Result<Option<(CacheEntry, Vec<u8>)>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(split) = raw.iter().position(|b| *b == b'\n') else {
            return Err(std::io::Error::new(ErrorKind::InvalidData, "entry has no header line").into());
        };

        let entry: CacheEntry = serde_json::from_slice(&raw[..split])?;
        let body = raw[split + 1..].to_vec();
        Ok(Some((entry, body)))
    }

    async fn read_header(path: &Path) -> Result<CacheEntry> {
        let file = fs::File::open(path).await?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).await?;
        Ok(serde_json::from_slice(line.trim_ascii_end())?)
    }

    async fn entry_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut read_dir = match fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = read_dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Best-effort removal; a file that is already gone is not an error
async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = ?path, error = %e, "Failed to remove file");
        }
    }
}

fn is_corrupt(err: &StoreError) -> bool {
    match err {
        StoreError::Serialization(_) => true,
        StoreError::Io(e) => e.kind() == ErrorKind::InvalidData,
        StoreError::InvalidNamespace(_) => false,
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn open(&self, name: &str) -> Result<NamespaceHandle> {
        let handle = NamespaceHandle::validated(name)?;
        fs::create_dir_all(self.namespace_dir(&handle)).await?;
        Ok(handle)
    }

    async fn get(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<Option<CachedResponse>> {
        let path = self.entry_path(ns, key);

        match Self::read_entry(&path).await {
            Ok(Some((entry, body))) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(namespace = ns.name(), key = %key, "Cache hit");
                Ok(Some(entry.into_response(body)))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) if is_corrupt(&e) => {
                warn!(namespace = ns.name(), key = %key, error = %e, "Corrupt entry, removing");
                remove_quietly(&path).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn put(
        &self,
        ns: &NamespaceHandle,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<()> {
        let path = self.entry_path(ns, key);
        let entry = CacheEntry::describe(key, response);

        let mut raw = serde_json::to_vec(&entry)?;
        raw.push(b'\n');
        raw.extend_from_slice(&response.body);

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), seq));

        let written = match fs::write(&tmp, &raw).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            remove_quietly(&tmp).await;
            return Err(e.into());
        }

        debug!(namespace = ns.name(), key = %key, size = entry.size, "Stored entry");
        Ok(())
    }

    async fn delete(&self, ns: &NamespaceHandle, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.entry_path(ns, key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, ns: &NamespaceHandle) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for path in Self::entry_files(&self.namespace_dir(ns)).await? {
            match Self::read_header(&path).await {
                Ok(entry) => keys.push(entry.key),
                // Removed by a concurrent delete or overwrite
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable entry"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// `total_size` counts body bytes, as recorded in each entry header
    async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        let mut read_dir = match fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!(root = ?self.root, error = %e, "Failed to read store root");
                return stats;
            }
        };

        while let Ok(Some(item)) = read_dir.next_entry().await {
            if !item.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let dir = item.path();
            stats.namespaces += 1;

            let Ok(files) = Self::entry_files(&dir).await else {
                continue;
            };
            for file in files {
                if let Ok(entry) = Self::read_header(&file).await {
                    stats.entries += 1;
                    stats.total_size += entry.size;
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> CachedResponse {
        CachedResponse::new(200, b"ID3\x04\x00\nbinary\n".to_vec())
            .with_header("content-type", "audio/mpeg")
            .with_header("x-origin", "upstream")
    }

    #[test]
    fn test_entry_name_generation() {
        let a = FileStore::entry_name(&CacheKey::from("/downloads/a.mp3"));
        let b = FileStore::entry_name(&CacheKey::from("/downloads/a.mp3"));
        let c = FileStore::entry_name(&CacheKey::from("/downloads/b.mp3"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        // 64 hex chars for SHA256 plus the extension
        assert_eq!(a.len(), 64 + 1 + ENTRY_EXTENSION.len());
    }

    #[tokio::test]
    async fn test_put_and_get_round_trips_body_and_headers() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.init().await.unwrap();

        let ns = store.open("media-v1").await.unwrap();
        let key = CacheKey::from("/downloads/song.mp3");
        store.put(&ns, &key, &sample()).await.unwrap();

        let stored = store.get(&ns, &key).await.unwrap().unwrap();
        assert_eq!(stored, sample());
    }

    #[tokio::test]
    async fn test_miss_and_counters() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let ns = store.open("media-v1").await.unwrap();
        let key = CacheKey::from("/downloads/song.mp3");

        assert!(store.get(&ns, &key).await.unwrap().is_none());
        store.put(&ns, &key, &sample()).await.unwrap();
        store.get(&ns, &key).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.namespaces, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, sample().body.len() as u64);
    }

    #[tokio::test]
    async fn test_total_size_matches_memory_store() {
        let dir = tempdir().unwrap();
        let file_store = FileStore::new(dir.path().to_path_buf());
        let memory_store = crate::store::MemoryStore::new();
        let key = CacheKey::from("/downloads/song.mp3");

        let stores: [&dyn CacheStore; 2] = [&file_store, &memory_store];
        for store in stores {
            let ns = store.open("media-v1").await.unwrap();
            store.put(&ns, &key, &sample()).await.unwrap();
        }

        assert_eq!(
            file_store.stats().await.total_size,
            memory_store.stats().await.total_size
        );
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let ns = store.open("media-v1").await.unwrap();
        let key = CacheKey::from("/downloads/song.mp3");

        // A directory where the entry belongs makes the rename fail
        let path = dir.path().join("media-v1").join(FileStore::entry_name(&key));
        fs::create_dir(&path).await.unwrap();
        fs::write(path.join("occupied"), b"x").await.unwrap();

        assert!(store.put(&ns, &key, &sample()).await.is_err());

        let mut read_dir = fs::read_dir(dir.path().join("media-v1")).await.unwrap();
        let mut names = Vec::new();
        while let Some(item) = read_dir.next_entry().await.unwrap() {
            names.push(item.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![FileStore::entry_name(&key)]);
    }

    #[tokio::test]
    async fn test_entries_survive_reopening() {
        let dir = tempdir().unwrap();
        let key = CacheKey::from("/index.html");

        {
            let store = FileStore::new(dir.path().to_path_buf());
            let ns = store.open("shell-v2").await.unwrap();
            store
                .put(&ns, &key, &CachedResponse::new(200, "<html>"))
                .await
                .unwrap();
        }

        let store = FileStore::new(dir.path().to_path_buf());
        let ns = store.open("shell-v2").await.unwrap();
        let stored = store.get(&ns, &key).await.unwrap().unwrap();
        assert_eq!(stored.body, b"<html>");
        assert_eq!(store.keys(&ns).await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let ns = store.open("media-v1").await.unwrap();
        let key = CacheKey::from("/downloads/song.mp3");

        assert!(!store.delete(&ns, &key).await.unwrap());
        store.put(&ns, &key, &sample()).await.unwrap();
        assert!(store.delete(&ns, &key).await.unwrap());
        assert!(store.get(&ns, &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_treated_as_miss() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let ns = store.open("media-v1").await.unwrap();
        let key = CacheKey::from("/downloads/song.mp3");

        let path = dir.path().join("media-v1").join(FileStore::entry_name(&key));
        fs::write(&path, b"not json\nbody").await.unwrap();
        assert!(store.get(&ns, &key).await.unwrap().is_none());
        assert!(!path.exists());

        fs::write(&path, b"no header at all").await.unwrap();
        assert!(store.get(&ns, &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_namespace_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.open("../escape").await,
            Err(StoreError::InvalidNamespace(_))
        ));
    }
}

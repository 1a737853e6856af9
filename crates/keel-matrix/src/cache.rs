//! Asset cache for expensive remote lookups
//!
//! Values are memoized as JSON under a stable key. There is no expiry: an
//! entry lives until an operator deletes it. The cache is populated once, up
//! front, before any parallel work starts, so it makes no attempt to arbitrate
//! concurrent first writes.

use crate::error::{MatrixError, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tracing::{debug, info, warn};

/// Backing storage for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Raw bytes stored under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Persist `bytes` under `key`, replacing any previous value
    async fn store(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Filesystem store: one JSON file per key below a root directory
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: Utf8PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<Utf8PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(MatrixError::cache(key, "invalid key segment"));
            }
            path.push(sanitize_segment(segment));
        }
        path.set_extension(match path.extension() {
            Some(ext) => format!("{}.json", ext),
            None => "json".to_string(),
        });
        Ok(path)
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MatrixError::cache(key, format!("read {}: {}", path, e))),
        }
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MatrixError::cache(key, format!("create {}: {}", parent, e)))?;
        }

        // Write-then-rename so an interrupted run never leaves a torn entry
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| MatrixError::cache(key, format!("write {}: {}", tmp, e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| MatrixError::cache(key, format!("rename to {}: {}", path, e)))?;
        Ok(())
    }
}

/// In-memory store, mainly for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| MatrixError::cache(key, "memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| MatrixError::cache(key, "memory store lock poisoned"))?;
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizing front end over a [`CacheStore`]
#[derive(Clone)]
pub struct AssetCache {
    store: Arc<dyn CacheStore>,
    offline: bool,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl AssetCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            offline: false,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cache rooted at a directory on disk
    pub fn on_disk(root: impl Into<Utf8PathBuf>) -> Self {
        Self::new(Arc::new(FsCacheStore::new(root)))
    }

    /// Cache that never calls producers; a miss is an error
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Return the value stored under `key`, or compute it with `producer`,
    /// persist it and return it
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(bytes) = self.store.load(key).await? {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!("Cache hit for: {}", key);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) if !self.offline => {
                    warn!("Discarding unreadable cache entry {}: {}", key, e);
                }
                Err(e) => {
                    return Err(MatrixError::cache(key, format!("unreadable entry: {}", e)));
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        if self.offline {
            return Err(MatrixError::cache(key, "not cached and running offline"));
        }

        debug!("Cache miss for: {}", key);
        let value = producer().await?;
        let bytes = serde_json::to_vec_pretty(&value)
            .map_err(|e| MatrixError::cache(key, format!("serialize: {}", e)))?;
        self.store.store(key, &bytes).await?;
        info!("Cached {}", key);
        Ok(value)
    }
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

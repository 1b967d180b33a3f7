//! In-process cache backend with TTL expiry and LRU eviction.
//!
//! Persists to `~/.mediassist/cache/answers.json` so answers survive a
//! restart in development. Not intended for multi-replica deployments;
//! use the Redis backend there.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Cache;
use crate::error::Result;

const DEFAULT_MAX_ENTRIES: usize = 500;

/// A single cached value with its expiry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    /// Unix timestamp after which the entry is dead.
    expires_at: u64,
    /// Unix timestamp of the last read, for LRU eviction.
    accessed_at: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Store {
    entries: HashMap<String, Entry>,
}

impl Store {
    fn evict_expired(&mut self, now: u64) {
        self.entries.retain(|_, e| e.expires_at > now);
    }

    fn evict_lru(&mut self) {
        if let Some(lru_key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.accessed_at)
            .map(|(k, _)| k.clone())
        {
            debug!(key = %&lru_key[..16.min(lru_key.len())], "Evicting LRU cache entry");
            self.entries.remove(&lru_key);
        }
    }
}

/// In-memory [`Cache`] backend with JSON persistence.
pub struct MemoryCache {
    store: Mutex<Store>,
    path: Option<PathBuf>,
    max_entries: usize,
}

impl MemoryCache {
    /// Create a cache persisting to `~/.mediassist/cache/answers.json`,
    /// loading any entries already on disk.
    pub fn new() -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mediassist")
            .join("cache")
            .join("answers.json");
        Self::with_path(Some(path))
    }

    /// Create a cache with an explicit persistence path, or none at all.
    pub fn with_path(path: Option<PathBuf>) -> Self {
        let store = match &path {
            Some(p) => Self::load_from_disk(p),
            None => Store::default(),
        };
        Self {
            store: Mutex::new(store),
            path,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Ephemeral cache with no disk persistence.
    pub fn ephemeral() -> Self {
        Self::with_path(None)
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = now_secs();
        let store = self.store.lock().await;
        store.entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry and flush the empty store.
    pub async fn clear(&self) {
        let mut store = self.store.lock().await;
        store.entries.clear();
        self.save_to_disk(&store);
    }

    fn load_from_disk(path: &Path) -> Store {
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(store) => store,
                Err(e) => {
                    warn!("Cache file is corrupt, starting empty: {}", e);
                    Store::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Store::default(),
            Err(e) => {
                warn!("Failed to read cache file, starting empty: {}", e);
                Store::default()
            }
        }
    }

    fn save_to_disk(&self, store: &Store) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(data) = serde_json::to_string(store) {
            if let Err(e) = std::fs::write(path, data) {
                warn!("Failed to save cache file: {}", e);
            }
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = now_secs();
        let mut store = self.store.lock().await;
        match store.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.accessed_at = now;
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                debug!(key = %&key[..16.min(key.len())], "Cache entry expired, removing");
                store.entries.remove(key);
                // Deferred disk write — flushed on the next set_ex/delete.
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let now = now_secs();
        let mut store = self.store.lock().await;
        store.evict_expired(now);
        while store.entries.len() >= self.max_entries.max(1) {
            store.evict_lru();
        }
        store.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now.saturating_add(ttl_secs),
                accessed_at: now,
            },
        );
        self.save_to_disk(&store);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        if store.entries.remove(key).is_some() {
            self.save_to_disk(&store);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = now_secs();
        let store = self.store.lock().await;
        Ok(store
            .entries
            .get(key)
            .map(|e| e.expires_at > now)
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

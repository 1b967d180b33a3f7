//! Answer and session caching with TTL expiry.
//!
//! Two backends implement the [`Cache`] trait: [`RedisCache`] for the
//! external store the container runs against, and [`MemoryCache`] for
//! development and tests. Key derivation lives here so both backends and
//! the gateway agree on it.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Key prefix for cached final answers.
const ANSWER_PREFIX: &str = "answer:";
/// Key prefix for per-session conversation state.
const STATE_PREFIX: &str = "state:";

/// String key-value store with per-entry TTL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value. `Ok(None)` means absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether a live (unexpired) entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Round-trip connectivity check, used at startup.
    async fn ping(&self) -> Result<()>;
}

/// Normalize a query for cache-key derivation.
///
/// Trims, collapses internal whitespace runs to single spaces, lowercases,
/// and applies Unicode NFKC so trivially reformatted queries share one
/// cache entry.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .nfkc()
        .collect()
}

/// Deterministic answer-cache key: SHA-256 of `(model, normalized_query)`.
///
/// Uses length-prefixed encoding to prevent separator collisions
/// (e.g. `model="a|b"` vs `model="a", query="|b"`).
pub fn answer_key(model: &str, query: &str) -> String {
    let normalized = normalize_query(query);
    let mut hasher = Sha256::new();
    hasher.update((model.len() as u64).to_le_bytes());
    hasher.update(model.as_bytes());
    hasher.update((normalized.len() as u64).to_le_bytes());
    hasher.update(normalized.as_bytes());
    format!("{ANSWER_PREFIX}{:x}", hasher.finalize())
}

/// Key holding the conversation state for a session.
pub fn state_key(session_id: &str) -> String {
    format!("{STATE_PREFIX}{session_id}")
}

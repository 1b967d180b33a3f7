//! Redis cache backend.
//!
//! Wraps a [`redis::aio::ConnectionManager`], which multiplexes one
//! reconnecting connection across clones. Connection errors at startup are
//! fatal (the service refuses to come up without its store); per-operation
//! errors are surfaced as [`MediError::Cache`] and degraded to misses by
//! the gateway.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use super::Cache;
use crate::error::{MediError, Result};

/// Redis-backed [`Cache`].
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| MediError::Cache(format!("invalid Redis URL: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| MediError::Cache(format!("Redis connection failed: {e}")))?;
        let cache = Self { manager };
        cache.ping().await?;
        info!("Redis connection established");
        Ok(cache)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| MediError::Cache(format!("GET {key}: {e}")))?;
        debug!(key, found = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| MediError::Cache(format!("SETEX {key}: {e}")))?;
        debug!(key, ttl_secs, "Redis SETEX");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| MediError::Cache(format!("DEL {key}: {e}")))?;
        debug!(key, "Redis DEL");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let found: bool = conn
            .exists(key)
            .await
            .map_err(|e| MediError::Cache(format!("EXISTS {key}: {e}")))?;
        Ok(found)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| MediError::Cache(format!("PING failed: {e}")))?;
        debug!(%pong, "Redis PING");
        Ok(())
    }
}

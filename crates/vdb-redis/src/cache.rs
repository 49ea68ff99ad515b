use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use vdb_core::{ExistenceCache, VdbError};

/// Configuration for [`RedisExistenceCache`].
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Key prefix for all cache entries. Defaults to `"vdb:"`.
    pub prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            prefix: "vdb:".to_string(),
        }
    }
}

/// Redis-backed implementation of the [`ExistenceCache`] trait.
///
/// Entries live under `{prefix}{key}` and expire through Redis TTLs.
pub struct RedisExistenceCache {
    client: redis::Client,
    config: RedisCacheConfig,
}

impl RedisExistenceCache {
    /// Create a new cache with an existing Redis client and configuration.
    pub fn new(client: redis::Client, config: RedisCacheConfig) -> Self {
        Self { client, config }
    }

    /// Create a new cache from a Redis URL with default configuration.
    pub fn from_url(url: &str) -> Result<Self, VdbError> {
        Self::from_url_with_config(url, RedisCacheConfig::default())
    }

    /// Create a new cache from a Redis URL with custom configuration.
    pub fn from_url_with_config(url: &str, config: RedisCacheConfig) -> Result<Self, VdbError> {
        let client = redis::Client::open(url)
            .map_err(|e| VdbError::Config(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    /// Build the full Redis key for a cache entry.
    pub fn redis_key(&self, key: &str) -> String {
        format!("{}{key}", self.config.prefix)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, VdbError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| VdbError::Cache(format!("Redis connection error: {e}")))
    }
}

#[async_trait]
impl ExistenceCache for RedisExistenceCache {
    async fn get(&self, key: &str) -> Result<Option<String>, VdbError> {
        let mut con = self.get_connection().await?;
        let raw: Option<String> = con
            .get(self.redis_key(key))
            .await
            .map_err(|e| VdbError::Cache(format!("Redis GET error: {e}")))?;
        Ok(raw)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), VdbError> {
        let mut con = self.get_connection().await?;
        con.pset_ex::<_, _, ()>(self.redis_key(key), value, crate::millis(ttl))
            .await
            .map_err(|e| VdbError::Cache(format!("Redis SET error: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), VdbError> {
        let mut con = self.get_connection().await?;
        con.del::<_, ()>(self.redis_key(key))
            .await
            .map_err(|e| VdbError::Cache(format!("Redis DEL error: {e}")))?;
        Ok(())
    }
}

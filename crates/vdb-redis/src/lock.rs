use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;
use vdb_core::{DistributedLock, LockGuard, VdbError};

/// Deletes the lock key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Configuration for [`RedisLock`].
#[derive(Debug, Clone)]
pub struct RedisLockConfig {
    /// Key prefix for all lock keys. Defaults to `"vdb:"`.
    pub prefix: String,
    /// Delay between acquisition attempts while the lock is held elsewhere.
    pub poll_interval: Duration,
}

impl Default for RedisLockConfig {
    fn default() -> Self {
        Self {
            prefix: "vdb:".to_string(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Redis-backed implementation of the [`DistributedLock`] trait.
///
/// A lock is the key `{prefix}{name}` set with `NX` and a `PX` lease to a
/// random token owned by the guard. Release runs a compare-and-delete script,
/// so a holder whose lease already lapsed cannot free a successor's lock.
pub struct RedisLock {
    client: redis::Client,
    config: RedisLockConfig,
}

impl RedisLock {
    /// Create a new lock service with an existing Redis client and configuration.
    pub fn new(client: redis::Client, config: RedisLockConfig) -> Self {
        Self { client, config }
    }

    /// Create a new lock service from a Redis URL with default configuration.
    pub fn from_url(url: &str) -> Result<Self, VdbError> {
        Self::from_url_with_config(url, RedisLockConfig::default())
    }

    /// Create a new lock service from a Redis URL with custom configuration.
    pub fn from_url_with_config(url: &str, config: RedisLockConfig) -> Result<Self, VdbError> {
        let client = redis::Client::open(url)
            .map_err(|e| VdbError::Config(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RedisLockConfig {
        &self.config
    }

    /// Build the Redis key for a lock name.
    pub fn redis_key(&self, name: &str) -> String {
        format!("{}{name}", self.config.prefix)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, VdbError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| VdbError::Lock(format!("Redis connection error: {e}")))
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<Box<dyn LockGuard>, VdbError> {
        let mut con = self.get_connection().await?;
        let key = self.redis_key(name);
        let token = Uuid::new_v4().to_string();
        let lease_ms = crate::millis(lease);
        let deadline = deadline_after(wait);

        loop {
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(lease_ms)
                .query_async(&mut con)
                .await
                .map_err(|e| VdbError::Lock(format!("Redis SET NX error: {e}")))?;

            if reply.is_some() {
                tracing::debug!("RedisLock: acquired '{key}' for {lease:?}");
                return Ok(Box::new(RedisLockGuard {
                    con,
                    name: name.to_string(),
                    key,
                    token,
                    released: false,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(VdbError::Lock(format!(
                    "timed out after {wait:?} waiting for lock '{name}'"
                )));
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Guard returned by [`RedisLock::acquire`].
pub struct RedisLockGuard {
    con: redis::aio::MultiplexedConnection,
    name: String,
    key: String,
    token: String,
    released: bool,
}

#[async_trait]
impl LockGuard for RedisLockGuard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn release(&mut self) -> Result<(), VdbError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut self.con)
            .await
            .map_err(|e| VdbError::Lock(format!("Redis release error: {e}")))?;

        if deleted == 0 {
            tracing::warn!("RedisLock: lease on '{}' expired before release", self.key);
        }
        Ok(())
    }
}

/// Deadline `wait` from now. Waits too long to represent never expire.
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

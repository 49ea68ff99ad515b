use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use vdb_core::{ExistenceCache, VdbError};

use crate::instant_after;

/// Process-local [`ExistenceCache`] with per-entry TTL.
///
/// Expired entries are treated as absent and pruned on the next write.
#[derive(Clone, Default)]
pub struct InMemoryExistenceCache {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl InMemoryExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ExistenceCache for InMemoryExistenceCache {
    async fn get(&self, key: &str) -> Result<Option<String>, VdbError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), VdbError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value.to_string(), instant_after(now, ttl)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), VdbError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

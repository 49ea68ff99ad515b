use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use vdb_core::{DistributedLock, LockGuard, VdbError};

use crate::instant_after;

struct Holder {
    token: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Shared {
    held: Mutex<HashMap<String, Holder>>,
    next_token: AtomicU64,
}

/// Process-local [`DistributedLock`] with lease expiry.
#[derive(Clone)]
pub struct InMemoryLock {
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// How often a waiting `acquire` re-checks the lock.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Whether `name` is currently held by an unexpired lease.
    pub async fn is_held(&self, name: &str) -> bool {
        let held = self.shared.held.lock().await;
        held.get(name)
            .is_some_and(|h| h.expires_at > Instant::now())
    }
}

impl Default for InMemoryLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<Box<dyn LockGuard>, VdbError> {
        let deadline = instant_after(Instant::now(), wait);
        loop {
            {
                let mut held = self.shared.held.lock().await;
                let now = Instant::now();
                let free = held.get(name).is_none_or(|h| h.expires_at <= now);
                if free {
                    let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
                    held.insert(
                        name.to_string(),
                        Holder {
                            token,
                            expires_at: instant_after(now, lease),
                        },
                    );
                    return Ok(Box::new(InMemoryLockGuard {
                        shared: Arc::clone(&self.shared),
                        name: name.to_string(),
                        token,
                        released: false,
                    }));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(VdbError::Lock(format!(
                    "timed out after {wait:?} waiting for lock '{name}'"
                )));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Guard returned by [`InMemoryLock::acquire`].
pub struct InMemoryLockGuard {
    shared: Arc<Shared>,
    name: String,
    token: u64,
    released: bool,
}

#[async_trait]
impl LockGuard for InMemoryLockGuard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn release(&mut self) -> Result<(), VdbError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut held = self.shared.held.lock().await;
        // Only remove the entry if the lease is still ours.
        if held.get(&self.name).is_some_and(|h| h.token == self.token) {
            held.remove(&self.name);
        } else {
            tracing::warn!(
                "InMemoryLock: lease on '{}' expired before release",
                self.name
            );
        }
        Ok(())
    }
}

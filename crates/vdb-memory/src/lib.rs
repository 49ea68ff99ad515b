//! In-process coordination primitives for VDB.
//!
//! [`InMemoryLock`] and [`InMemoryExistenceCache`] implement the
//! [`DistributedLock`](vdb_core::DistributedLock) and
//! [`ExistenceCache`](vdb_core::ExistenceCache) traits for a single process.
//! They are what tests and single-node deployments plug into a backend in
//! place of Redis. Clones share state.

use std::time::Duration;

use tokio::time::Instant;

mod cache;
mod lock;

pub use cache::InMemoryExistenceCache;
pub use lock::{InMemoryLock, InMemoryLockGuard};

// Re-export core traits for convenience.
pub use vdb_core::{DistributedLock, ExistenceCache, LockGuard};

/// Roughly 30 years, the stand-in for "never".
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + duration`, saturating at a far-future instant instead of
/// overflowing on durations such as [`Duration::MAX`].
pub(crate) fn instant_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

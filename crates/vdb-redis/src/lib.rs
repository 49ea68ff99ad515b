//! Redis integration for VDB.
//!
//! This crate provides two Redis-backed implementations:
//!
//! - [`RedisLock`]: implements [`DistributedLock`](vdb_core::DistributedLock)
//!   with `SET NX PX` leases and an owner-checked release script.
//! - [`RedisExistenceCache`]: implements
//!   [`ExistenceCache`](vdb_core::ExistenceCache) on plain `GET` / `PSETEX` /
//!   `DEL`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vdb_redis::{RedisExistenceCache, RedisLock};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = redis::Client::open("redis://127.0.0.1/")?;
//! let lock = RedisLock::new(client.clone(), Default::default());
//! let cache = RedisExistenceCache::new(client, Default::default());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

mod cache;
mod lock;

pub use cache::{RedisCacheConfig, RedisExistenceCache};
pub use lock::{RedisLock, RedisLockConfig, RedisLockGuard};

// Re-export core traits for convenience.
pub use vdb_core::{DistributedLock, ExistenceCache, LockGuard};

/// Whole milliseconds for `PX`, at least 1 since Redis rejects a zero expiry.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}

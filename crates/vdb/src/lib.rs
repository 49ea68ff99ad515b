//! VDB: vector-store backends for retrieval-augmented generation.
//!
//! This crate re-exports the VDB sub-crates for convenient single-import usage.
//! Enable features to control which modules are available.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `memory` |
//! | `memory` | In-process lock and existence cache |
//! | `redis` | Redis lock and existence cache |
//! | `pgvecto-rs` | PostgreSQL collection backend (pgvecto.rs or pgvector) |
//! | `full` | All features enabled |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vdb::core::{Document, SearchOptions, VectorBackend};
//! use vdb::pgvecto_rs::{PgVectoRsConfig, PgVectorCollection};
//! use vdb::redis::{RedisExistenceCache, RedisLock};
//! ```

/// Core traits and types: Document, SearchOptions, VectorBackend,
/// DistributedLock, ExistenceCache, VdbError. Always available.
pub use vdb_core as core;

/// In-process lock and existence cache.
#[cfg(feature = "memory")]
pub use vdb_memory as memory;

/// Redis lock and existence cache.
#[cfg(feature = "redis")]
pub use vdb_redis as redis;

/// PostgreSQL collection backend.
#[cfg(feature = "pgvecto-rs")]
pub use vdb_pgvecto_rs as pgvecto_rs;

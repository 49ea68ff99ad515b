//! PostgreSQL collection backend for VDB.
//!
//! This crate provides [`PgVectorCollection`], an implementation of the
//! [`VectorBackend`](vdb_core::VectorBackend) trait for one named collection
//! stored in PostgreSQL with either the
//! [pgvecto.rs](https://github.com/tensorchord/pgvecto.rs) (`vectors`) or the
//! [pgvector](https://github.com/pgvector/pgvector) (`vector`) extension.
//! Each collection is a table of `(id, text, metadata, vector)` rows with one
//! L2 HNSW index, created lazily under a distributed lock.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vdb_memory::{InMemoryExistenceCache, InMemoryLock};
//! use vdb_pgvecto_rs::{PgVectoRsConfig, PgVectorCollection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PgVectoRsConfig::new("localhost", 5432, "postgres", "secret", "vdb")?;
//! let pool = config.connect(5).await?;
//!
//! let collection = PgVectorCollection::new(
//!     "documents",
//!     pool,
//!     Arc::new(InMemoryLock::new()),
//!     Arc::new(InMemoryExistenceCache::new()),
//! )?;
//! collection.initialize().await?;
//! # Ok(())
//! # }
//! ```

mod collection;
mod config;
mod options;
mod sql;

pub use collection::PgVectorCollection;
pub use config::PgVectoRsConfig;
pub use options::{CollectionOptions, IndexParams, VectorExtension};
pub use sql::validate_collection_name;

// Re-export core traits/types for convenience.
pub use vdb_core::{Document, SearchOptions, VdbError, VectorBackend};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use vdb_core::VdbError;

/// Which PostgreSQL vector extension backs the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorExtension {
    /// pgvecto.rs, installed as the `vectors` extension.
    #[default]
    PgVectoRs,
    /// pgvector, installed as the `vector` extension.
    PgVector,
}

impl VectorExtension {
    /// Name passed to `CREATE EXTENSION`.
    pub fn extension_name(self) -> &'static str {
        match self {
            Self::PgVectoRs => "vectors",
            Self::PgVector => "vector",
        }
    }

    pub fn backend_type(self) -> &'static str {
        match self {
            Self::PgVectoRs => "pgvecto-rs",
            Self::PgVector => "pgvector",
        }
    }
}

impl fmt::Display for VectorExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_type())
    }
}

impl FromStr for VectorExtension {
    type Err = VdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pgvecto-rs" | "pgvecto.rs" | "pgvecto_rs" | "vectors" => Ok(Self::PgVectoRs),
            "pgvector" | "vector" => Ok(Self::PgVector),
            other => Err(VdbError::Config(format!(
                "unknown vector extension '{other}': expected pgvecto-rs or pgvector"
            ))),
        }
    }
}

/// Construction parameters of the collection's HNSW index.
///
/// The segment and thread settings only apply to pgvecto.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexParams {
    /// Graph degree.
    pub m: u32,
    /// Candidate list size while building.
    pub ef_construction: u32,
    pub optimizing_threads: u32,
    pub max_growing_segment_size: u64,
    pub max_sealed_segment_size: u64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            m: 30,
            ef_construction: 500,
            optimizing_threads: 30,
            max_growing_segment_size: 2000,
            max_sealed_segment_size: 30_000_000,
        }
    }
}

/// Tuning of a [`PgVectorCollection`](crate::PgVectorCollection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    pub extension: VectorExtension,
    pub index: IndexParams,
    /// How long the schema-creation lock is held before it expires on its own.
    pub lock_lease: Duration,
    /// How long `create_collection` waits for another holder of the lock.
    pub lock_wait: Duration,
    /// Validity of the "collection exists" flag.
    pub existence_ttl: Duration,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            extension: VectorExtension::default(),
            index: IndexParams::default(),
            lock_lease: Duration::from_secs(20),
            lock_wait: Duration::from_secs(20),
            existence_ttl: Duration::from_secs(3600),
        }
    }
}

impl CollectionOptions {
    pub fn with_extension(mut self, extension: VectorExtension) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_index(mut self, index: IndexParams) -> Self {
        self.index = index;
        self
    }

    pub fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = lease;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn with_existence_ttl(mut self, ttl: Duration) -> Self {
        self.existence_ttl = ttl;
        self
    }
}

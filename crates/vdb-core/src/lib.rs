//! Core traits and types shared by every VDB backend crate.
//!
//! A backend persists embedded text chunks for one named collection and
//! answers nearest-neighbour queries over them. Backends that create schema
//! lazily coordinate through a [`DistributedLock`] and remember finished
//! work in an [`ExistenceCache`]; both are injected by the owning service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Metadata key holding the id of the source document a chunk belongs to.
pub const DOCUMENT_ID_KEY: &str = "document_id";

/// Metadata key holding the caller-assigned id of an individual chunk.
pub const DOC_ID_KEY: &str = "doc_id";

/// Metadata key a search attaches to every returned document.
pub const SCORE_KEY: &str = "score";

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A chunk of text plus its metadata, the unit a backend stores and returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        page_content: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// Builder-style helper to attach one metadata entry.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Return a metadata value if it is a JSON string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// The `doc_id` metadata field, if present.
    pub fn doc_id(&self) -> Option<&str> {
        self.metadata_str(DOC_ID_KEY)
    }

    /// The `document_id` metadata field, if present.
    pub fn document_id(&self) -> Option<&str> {
        self.metadata_str(DOCUMENT_ID_KEY)
    }

    /// The `score` a search attached to this document, if any.
    pub fn score(&self) -> Option<f64> {
        self.metadata.get(SCORE_KEY).and_then(Value::as_f64)
    }
}

// ---------------------------------------------------------------------------
// Search options
// ---------------------------------------------------------------------------

/// Parameters of a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of candidates fetched from the index.
    pub top_k: usize,
    /// Metadata the results must contain (JSON containment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<HashMap<String, Value>>,
    /// Only results whose score is strictly greater than this are returned.
    #[serde(default)]
    pub score_threshold: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            filter: None,
            score_threshold: 0.0,
        }
    }
}

impl SearchOptions {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: HashMap<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_score_threshold(mut self, score_threshold: f64) -> Self {
        self.score_threshold = score_threshold;
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for VDB backends.
///
/// Empty lookups are never errors; they come back as empty collections.
#[derive(Debug, Error)]
pub enum VdbError {
    /// A required connection parameter is missing or malformed.
    #[error("config error: {0}")]
    Config(String),
    /// DDL failed, or the collection's table does not exist.
    #[error("schema error: {0}")]
    Schema(String),
    /// The collection lock could not be acquired or released.
    #[error("lock error: {0}")]
    Lock(String),
    /// The backend rejected a query or a filter.
    #[error("query error: {0}")]
    Query(String),
    /// Caller input was rejected before reaching the backend.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// Coordination traits
// ---------------------------------------------------------------------------

/// Handle to a held lock. Dropping it without calling
/// [`release`](LockGuard::release) leaves the lock to expire with its lease.
#[async_trait]
pub trait LockGuard: Send {
    /// Name the lock was acquired under.
    fn name(&self) -> &str;

    /// Release the lock. Calling this more than once is a no-op.
    async fn release(&mut self) -> Result<(), VdbError>;
}

/// Named, time-bounded mutual exclusion shared across processes.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquire `name`, holding it for at most `lease`.
    ///
    /// Waits up to `wait` for a current holder to let go and fails with
    /// [`VdbError::Lock`] once that bound passes.
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<Box<dyn LockGuard>, VdbError>;
}

/// Short-lived key/value flags. Best-effort, never authoritative.
#[async_trait]
pub trait ExistenceCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, VdbError>;

    /// Set `key` to `value`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), VdbError>;

    async fn delete(&self, key: &str) -> Result<(), VdbError>;
}

// ---------------------------------------------------------------------------
// VectorBackend trait
// ---------------------------------------------------------------------------

/// Storage contract every vector-store backend satisfies for one collection.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Short identifier of the backend kind, e.g. `"pgvecto-rs"`.
    fn backend_type(&self) -> &'static str;

    /// Name of the collection this backend instance is bound to.
    fn collection_name(&self) -> &str;

    /// Create the collection sized from the first embedding, then insert.
    async fn create(
        &self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<String>, VdbError>;

    /// Insert documents with their embeddings, returning one generated id
    /// per document in input order.
    async fn add_texts(
        &self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<String>, VdbError>;

    /// Whether a chunk whose `doc_id` metadata equals `id` is stored.
    async fn text_exists(&self, id: &str) -> Result<bool, VdbError>;

    /// Delete chunks whose `doc_id` metadata is one of `ids`.
    async fn delete_by_ids(&self, ids: &[&str]) -> Result<(), VdbError>;

    /// Row ids whose metadata field `key` equals `value` exactly.
    async fn get_ids_by_metadata_field(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>, VdbError>;

    async fn delete_by_metadata_field(&self, key: &str, value: &str) -> Result<(), VdbError>;

    /// Delete every chunk of one source document.
    async fn delete_by_document_id(&self, document_id: &str) -> Result<(), VdbError> {
        self.delete_by_metadata_field(DOCUMENT_ID_KEY, document_id).await
    }

    /// Nearest-neighbour search. Each result carries its `score` in metadata.
    async fn search_by_vector(
        &self,
        query_vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<Document>, VdbError>;

    /// Keyword search. Backends without a full-text index return nothing.
    async fn search_by_full_text(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Document>, VdbError>;

    /// Drop the whole collection. Irreversible.
    async fn delete(&self) -> Result<(), VdbError>;
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use vdb_core::{
    DistributedLock, Document, ExistenceCache, SearchOptions, VdbError, VectorBackend, SCORE_KEY,
};

use crate::options::CollectionOptions;
use crate::sql;

/// Metadata key holding the raw L2 distance of a search hit.
const DISTANCE_KEY: &str = "distance";

/// SQLSTATE `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// A [`VectorBackend`] storing one collection in a PostgreSQL table.
///
/// The table has columns:
/// - `id UUID PRIMARY KEY`
/// - `text TEXT NOT NULL`
/// - `metadata JSONB NOT NULL`
/// - `vector vector(<dimension>) NOT NULL`
///
/// plus one L2 HNSW index named `{collection}_embedding_index`. The table is
/// created by [`create_collection`](Self::create_collection) under the
/// injected [`DistributedLock`]; an [`ExistenceCache`] flag short-circuits
/// repeated creation for [`CollectionOptions::existence_ttl`].
///
/// Creation is destructive: when the flag is absent, any existing table with
/// the same name is dropped first. Once the flag has expired, a second
/// `create` with a different dimension discards the previous rows.
pub struct PgVectorCollection {
    collection_name: String,
    pool: PgPool,
    lock: Arc<dyn DistributedLock>,
    cache: Arc<dyn ExistenceCache>,
    options: CollectionOptions,
}

impl PgVectorCollection {
    /// Bind a collection to its table. The name is validated here because it
    /// is interpolated into every statement.
    ///
    /// PostgreSQL folds unquoted identifiers to lower case, so the name is
    /// lowercased before it is used for the table, the lock and the flag.
    /// `Docs` and `docs` are the same collection.
    pub fn new(
        collection_name: impl Into<String>,
        pool: PgPool,
        lock: Arc<dyn DistributedLock>,
        cache: Arc<dyn ExistenceCache>,
    ) -> Result<Self, VdbError> {
        let collection_name = collection_name.into();
        sql::validate_collection_name(&collection_name)?;
        let collection_name = collection_name.to_ascii_lowercase();
        Ok(Self {
            collection_name,
            pool,
            lock,
            cache,
            options: CollectionOptions::default(),
        })
    }

    pub fn with_options(mut self, options: CollectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Return a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Name of the lock serializing schema creation for this collection.
    pub fn lock_name(&self) -> String {
        format!("vector_indexing_lock_{}", self.collection_name)
    }

    /// Cache key of the "collection exists" flag.
    pub fn existence_key(&self) -> String {
        format!("vector_indexing_{}", self.collection_name)
    }

    /// Name of the similarity index.
    pub fn index_name(&self) -> String {
        sql::index_name(&self.collection_name)
    }

    /// Ensure the vector extension is installed. Idempotent.
    pub async fn initialize(&self) -> Result<(), VdbError> {
        let extension = self.options.extension;
        sqlx::query(&sql::create_extension(extension))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                VdbError::Schema(format!(
                    "failed to create {} extension: {e}",
                    extension.extension_name()
                ))
            })?;
        Ok(())
    }

    /// Create the table and index for `dimension`-wide vectors unless the
    /// existence flag says this already happened.
    ///
    /// Makes a single attempt at the lock; failing to get it within
    /// [`CollectionOptions::lock_wait`] is a [`VdbError::Lock`].
    pub async fn create_collection(&self, dimension: usize) -> Result<(), VdbError> {
        if dimension == 0 {
            return Err(VdbError::Validation(
                "vector dimension must be > 0".to_string(),
            ));
        }

        let mut guard = self
            .lock
            .acquire(
                &self.lock_name(),
                self.options.lock_lease,
                self.options.lock_wait,
            )
            .await?;

        let result = self.create_collection_locked(dimension).await;

        if let Err(e) = guard.release().await {
            tracing::warn!(
                "PgVectorCollection: failed to release '{}', lease will expire: {e}",
                guard.name()
            );
        }
        result
    }

    async fn create_collection_locked(&self, dimension: usize) -> Result<(), VdbError> {
        let key = self.existence_key();
        if self.cache.get(&key).await?.is_some() {
            tracing::debug!(
                "PgVectorCollection: '{}' already created, skipping DDL",
                self.collection_name
            );
            return Ok(());
        }

        self.rebuild_schema(dimension).await?;
        self.cache.set(&key, "1", self.options.existence_ttl).await?;
        tracing::info!(
            "PgVectorCollection: created '{}' with dimension {dimension}",
            self.collection_name
        );
        Ok(())
    }

    /// Drop and recreate the table and its index in one transaction.
    async fn rebuild_schema(&self, dimension: usize) -> Result<(), VdbError> {
        let table = &self.collection_name;
        let statements = [
            sql::drop_table(table),
            sql::create_table(table, dimension),
            sql::create_index(table, self.options.extension, &self.options.index),
        ];

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VdbError::Schema(format!("failed to begin schema transaction: {e}")))?;
        for statement in &statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    VdbError::Schema(format!("schema statement failed for '{table}': {e}"))
                })?;
        }
        tx.commit()
            .await
            .map_err(|e| VdbError::Schema(format!("failed to commit schema for '{table}': {e}")))?;
        Ok(())
    }

    /// Row ids whose metadata `key` equals `value`, inside `executor`.
    async fn select_row_ids<'e, E>(
        &self,
        executor: E,
        key: &str,
        value: &str,
    ) -> Result<Vec<Uuid>, VdbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&sql::select_ids_by_metadata(&self.collection_name))
            .bind(key)
            .bind(value)
            .fetch_all(executor)
            .await
            .map_err(|e| self.query_error("metadata lookup", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Map a driver error, reporting a missing table as a schema error.
    fn query_error(&self, context: &str, e: sqlx::Error) -> VdbError {
        if is_undefined_table(&e) {
            VdbError::Schema(format!(
                "collection '{}' does not exist: {e}",
                self.collection_name
            ))
        } else {
            VdbError::Query(format!("{context} failed: {e}"))
        }
    }
}

#[async_trait]
impl VectorBackend for PgVectorCollection {
    fn backend_type(&self) -> &'static str {
        self.options.extension.backend_type()
    }

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn create(
        &self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<String>, VdbError> {
        check_batch_len(&documents, &embeddings)?;
        let dimension = batch_dimension(&embeddings)?.ok_or_else(|| {
            VdbError::Validation(
                "cannot create a collection from an empty embedding batch".to_string(),
            )
        })?;
        self.create_collection(dimension).await?;
        self.add_texts(documents, embeddings).await
    }

    async fn add_texts(
        &self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<String>, VdbError> {
        check_batch_len(&documents, &embeddings)?;
        if batch_dimension(&embeddings)?.is_none() {
            return Ok(Vec::new());
        }

        let insert_sql = sql::insert(&self.collection_name);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| self.query_error("begin insert transaction", e))?;

        let mut ids = Vec::with_capacity(documents.len());
        for (doc, embedding) in documents.into_iter().zip(embeddings) {
            let id = Uuid::new_v4();
            let metadata = serde_json::to_value(&doc.metadata).map_err(|e| {
                VdbError::Serialization(format!("failed to serialize metadata: {e}"))
            })?;

            sqlx::query(&insert_sql)
                .bind(id)
                .bind(&doc.page_content)
                .bind(&metadata)
                .bind(sql::vector_literal(&embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| self.query_error("insert", e))?;

            ids.push(id.to_string());
        }

        tx.commit()
            .await
            .map_err(|e| self.query_error("commit insert batch", e))?;
        tracing::debug!(
            "PgVectorCollection: inserted {} rows into '{}'",
            ids.len(),
            self.collection_name
        );
        Ok(ids)
    }

    async fn text_exists(&self, id: &str) -> Result<bool, VdbError> {
        let row: Option<(Uuid,)> = sqlx::query_as(&sql::doc_id_exists(&self.collection_name))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.query_error("existence probe", e))?;
        Ok(row.is_some())
    }

    async fn delete_by_ids(&self, ids: &[&str]) -> Result<(), VdbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let id_strings: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        let result = sqlx::query(&sql::delete_by_doc_ids(&self.collection_name))
            .bind(&id_strings)
            .execute(&self.pool)
            .await
            .map_err(|e| self.query_error("delete by doc_id", e))?;

        tracing::debug!(
            "PgVectorCollection: deleted {} rows from '{}' by doc_id",
            result.rows_affected(),
            self.collection_name
        );
        Ok(())
    }

    async fn get_ids_by_metadata_field(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>, VdbError> {
        let ids = self.select_row_ids(&self.pool, key, value).await?;
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn delete_by_metadata_field(&self, key: &str, value: &str) -> Result<(), VdbError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| self.query_error("begin delete transaction", e))?;

        let ids = self.select_row_ids(&mut *tx, key, value).await?;
        if ids.is_empty() {
            return Ok(());
        }

        sqlx::query(&sql::delete_by_row_ids(&self.collection_name))
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.query_error("delete by metadata", e))?;
        tx.commit()
            .await
            .map_err(|e| self.query_error("commit delete", e))?;

        tracing::debug!(
            "PgVectorCollection: deleted {} rows from '{}' where {key} = {value}",
            ids.len(),
            self.collection_name
        );
        Ok(())
    }

    async fn search_by_vector(
        &self,
        query_vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<Document>, VdbError> {
        if query_vector.is_empty() {
            return Err(VdbError::Validation(
                "query vector must not be empty".to_string(),
            ));
        }
        if options.top_k == 0 {
            return Ok(Vec::new());
        }

        let query = sql::vector_literal(query_vector);
        let limit = i64::try_from(options.top_k).unwrap_or(i64::MAX);
        let filter = match &options.filter {
            Some(filter) if !filter.is_empty() => Some(serde_json::to_value(filter).map_err(|e| {
                VdbError::Serialization(format!("failed to serialize filter: {e}"))
            })?),
            _ => None,
        };

        let search_sql = sql::search(&self.collection_name, filter.is_some());
        let mut q = sqlx::query_as::<_, (String, Value, f64)>(&search_sql)
            .bind(&query)
            .bind(limit);
        if let Some(filter) = &filter {
            q = q.bind(filter);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_error("similarity search", e))?;

        Ok(rows_to_documents(rows, options.score_threshold))
    }

    async fn search_by_full_text(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<Document>, VdbError> {
        // Neither extension exposes a BM25 index.
        Ok(Vec::new())
    }

    async fn delete(&self) -> Result<(), VdbError> {
        sqlx::query(&sql::drop_table(&self.collection_name))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                VdbError::Schema(format!(
                    "failed to drop collection '{}': {e}",
                    self.collection_name
                ))
            })?;
        tracing::info!("PgVectorCollection: dropped '{}'", self.collection_name);

        if let Err(e) = self.cache.delete(&self.existence_key()).await {
            tracing::warn!(
                "PgVectorCollection: failed to clear existence flag for '{}': {e}",
                self.collection_name
            );
        }
        Ok(())
    }
}

fn check_batch_len(documents: &[Document], embeddings: &[Vec<f32>]) -> Result<(), VdbError> {
    if documents.len() != embeddings.len() {
        return Err(VdbError::Validation(format!(
            "got {} documents but {} embeddings",
            documents.len(),
            embeddings.len()
        )));
    }
    Ok(())
}

/// Width shared by every embedding of a batch, or `None` for an empty batch.
fn batch_dimension(embeddings: &[Vec<f32>]) -> Result<Option<usize>, VdbError> {
    let Some(first) = embeddings.first() else {
        return Ok(None);
    };
    let dimension = first.len();
    if dimension == 0 {
        return Err(VdbError::Validation(
            "embeddings must not be empty vectors".to_string(),
        ));
    }
    if let Some((i, e)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != dimension)
    {
        return Err(VdbError::Validation(format!(
            "embedding {i} has dimension {} but the batch has dimension {dimension}",
            e.len()
        )));
    }
    Ok(Some(dimension))
}

/// Similarity in `(0, 1]` for an L2 distance, higher is closer.
fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Turn search rows into documents carrying `score` and `distance`, keeping
/// only scores strictly above `score_threshold`.
fn rows_to_documents(rows: Vec<(String, Value, f64)>, score_threshold: f64) -> Vec<Document> {
    rows.into_iter()
        .filter_map(|(text, metadata, distance)| {
            let score = distance_to_score(distance);
            if score <= score_threshold {
                return None;
            }
            let mut metadata: HashMap<String, Value> = match metadata {
                Value::Object(map) => map.into_iter().collect(),
                _ => HashMap::new(),
            };
            metadata.insert(SCORE_KEY.to_string(), Value::from(score));
            metadata.insert(DISTANCE_KEY.to_string(), Value::from(distance));
            Some(Document::with_metadata(text, metadata))
        })
        .collect()
}

fn is_undefined_table(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNDEFINED_TABLE)
}

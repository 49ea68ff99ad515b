use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use vdb::core::{
    DistributedLock, Document, ExistenceCache, SearchOptions, VdbError, VectorBackend,
};
use vdb::memory::{InMemoryExistenceCache, InMemoryLock};
use vdb::pgvecto_rs::{CollectionOptions, PgVectoRsConfig, PgVectorCollection, VectorExtension};
use vdb::redis::{RedisExistenceCache, RedisLock};

/// Connection settings come from `POSTGRESQL_*`; set `REDIS_URL` to
/// coordinate through Redis and `VDB_VECTOR_EXTENSION=pgvector` to use
/// pgvector instead of pgvecto.rs.
#[tokio::main]
async fn main() -> Result<(), VdbError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PgVectoRsConfig::from_env()?;
    let extension: VectorExtension = match std::env::var("VDB_VECTOR_EXTENSION") {
        Ok(raw) => raw.parse()?,
        Err(_) => VectorExtension::default(),
    };
    tracing::info!("connecting to {config:?} using {extension}");
    let pool = config.connect(5).await?;

    let redis_url = std::env::var("REDIS_URL").ok();
    let lock: Arc<dyn DistributedLock> = match &redis_url {
        Some(url) => Arc::new(RedisLock::from_url(url)?),
        None => Arc::new(InMemoryLock::new()),
    };
    let cache: Arc<dyn ExistenceCache> = match &redis_url {
        Some(url) => Arc::new(RedisExistenceCache::from_url(url)?),
        None => Arc::new(InMemoryExistenceCache::new()),
    };

    let collection = PgVectorCollection::new("vdb_demo", pool, lock, cache)?
        .with_options(CollectionOptions::default().with_extension(extension));
    collection.initialize().await?;

    // --- Create and insert ---
    println!("=== Creating collection ===");
    let docs = vec![
        Document::new("Rust is a systems programming language.")
            .with_field("document_id", "d1")
            .with_field("doc_id", "c1"),
        Document::new("Python is popular for data science.")
            .with_field("document_id", "d1")
            .with_field("doc_id", "c2"),
        Document::new("Go has lightweight goroutines.")
            .with_field("document_id", "d2")
            .with_field("doc_id", "c3"),
    ];
    let embeddings = vec![
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0, 0.0],
        vec![0.0, 0.0, 1.0, 0.0],
    ];
    let ids = collection.create(docs, embeddings).await?;
    println!("Inserted {} rows: {ids:?}", ids.len());

    // --- Search ---
    println!("\n=== Searching ===");
    let results = collection
        .search_by_vector(&[0.9, 0.1, 0.0, 0.0], &SearchOptions::new(2))
        .await?;
    for doc in &results {
        println!("  {:.3}  {}", doc.score().unwrap_or_default(), doc.page_content);
    }

    let filter = HashMap::from([("document_id".to_string(), json!("d2"))]);
    let filtered = collection
        .search_by_vector(&[0.9, 0.1, 0.0, 0.0], &SearchOptions::new(2).with_filter(filter))
        .await?;
    println!("Filtered to d2: {} result(s)", filtered.len());

    // --- Delete ---
    println!("\n=== Deleting ===");
    println!("c3 exists: {}", collection.text_exists("c3").await?);
    collection.delete_by_ids(&["c3"]).await?;
    println!("c3 exists after delete: {}", collection.text_exists("c3").await?);

    collection.delete_by_document_id("d1").await?;
    let remaining = collection.get_ids_by_metadata_field("document_id", "d1").await?;
    println!("d1 rows after delete: {}", remaining.len());

    collection.delete().await?;
    println!("Collection dropped");
    Ok(())
}

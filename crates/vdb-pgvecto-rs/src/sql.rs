//! SQL text for one collection table.
//!
//! Table and index names cannot be bound as parameters, so every builder
//! takes a name that already passed [`validate_collection_name`]. Values are
//! always bound.

use vdb_core::{VdbError, DOC_ID_KEY};

use crate::options::{IndexParams, VectorExtension};

/// Longest PostgreSQL identifier, in bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

const INDEX_SUFFIX: &str = "_embedding_index";

/// Validate that a collection name is safe to interpolate into SQL.
///
/// Allows ASCII letters, digits and underscores, not starting with a digit,
/// and short enough that `{name}_embedding_index` is still a valid
/// identifier.
pub fn validate_collection_name(name: &str) -> Result<(), VdbError> {
    if name.is_empty() {
        return Err(VdbError::Validation(
            "collection name must not be empty".to_string(),
        ));
    }
    let max_len = MAX_IDENTIFIER_LEN - INDEX_SUFFIX.len();
    if name.len() > max_len {
        return Err(VdbError::Validation(format!(
            "collection name '{name}' is longer than {max_len} bytes"
        )));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(VdbError::Validation(format!(
            "invalid collection name '{name}': must not start with a digit"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(VdbError::Validation(format!(
            "invalid collection name '{name}': only alphanumeric and underscore characters are allowed",
        )));
    }
    Ok(())
}

pub(crate) fn index_name(table: &str) -> String {
    format!("{table}{INDEX_SUFFIX}")
}

pub(crate) fn create_extension(extension: VectorExtension) -> String {
    format!(
        "CREATE EXTENSION IF NOT EXISTS {}",
        extension.extension_name()
    )
}

pub(crate) fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

pub(crate) fn create_table(table: &str, dimension: usize) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                text TEXT NOT NULL,
                metadata JSONB NOT NULL,
                vector vector({dimension}) NOT NULL
            )"#
    )
}

pub(crate) fn create_index(
    table: &str,
    extension: VectorExtension,
    params: &IndexParams,
) -> String {
    let index = index_name(table);
    match extension {
        VectorExtension::PgVectoRs => format!(
            r#"CREATE INDEX {index}
               ON {table} USING vectors (vector vector_l2_ops)
               WITH (options = $$
optimizing.optimizing_threads = {threads}
segment.max_growing_segment_size = {growing}
segment.max_sealed_segment_size = {sealed}
[indexing.hnsw]
m = {m}
ef_construction = {ef}
$$)"#,
            threads = params.optimizing_threads,
            growing = params.max_growing_segment_size,
            sealed = params.max_sealed_segment_size,
            m = params.m,
            ef = params.ef_construction,
        ),
        VectorExtension::PgVector => format!(
            "CREATE INDEX {index} ON {table} USING hnsw (vector vector_l2_ops) \
             WITH (m = {m}, ef_construction = {ef})",
            m = params.m,
            ef = params.ef_construction,
        ),
    }
}

/// Text form `[x,y,..]` of an embedding.
///
/// Both extensions parse this through the `vector` input function, so it is
/// bound as text and cast with `::vector`.
pub(crate) fn vector_literal(embedding: &[f32]) -> String {
    let mut literal = String::with_capacity(embedding.len() * 8 + 2);
    literal.push('[');
    for (i, x) in embedding.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        literal.push_str(&x.to_string());
    }
    literal.push(']');
    literal
}

/// `$4` = embedding as a [`vector_literal`].
pub(crate) fn insert(table: &str) -> String {
    format!("INSERT INTO {table} (id, text, metadata, vector) VALUES ($1, $2, $3, $4::vector)")
}

/// `$1` = metadata key, `$2` = value.
pub(crate) fn select_ids_by_metadata(table: &str) -> String {
    format!("SELECT id FROM {table} WHERE metadata->>$1 = $2")
}

/// `$1` = row ids.
pub(crate) fn delete_by_row_ids(table: &str) -> String {
    format!("DELETE FROM {table} WHERE id = ANY($1)")
}

/// `$1` = chunk ids matched against `metadata->>'doc_id'`.
pub(crate) fn delete_by_doc_ids(table: &str) -> String {
    format!("DELETE FROM {table} WHERE metadata->>'{DOC_ID_KEY}' = ANY($1)")
}

/// `$1` = chunk id.
pub(crate) fn doc_id_exists(table: &str) -> String {
    format!("SELECT id FROM {table} WHERE metadata->>'{DOC_ID_KEY}' = $1 LIMIT 1")
}

/// `$1` = query [`vector_literal`], `$2` = limit, `$3` = JSONB containment filter.
pub(crate) fn search(table: &str, with_filter: bool) -> String {
    let filter = if with_filter {
        "WHERE metadata @> $3::jsonb"
    } else {
        ""
    };
    format!(
        r#"SELECT text, metadata, (vector <-> $1::vector)::float8 AS distance
           FROM {table}
           {filter}
           ORDER BY vector <-> $1::vector
           LIMIT $2"#
    )
}

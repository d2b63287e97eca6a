//! Vector store abstraction and the factory that picks a storage strategy
//!
//! Two interchangeable implementations:
//! - **Native** (`PgVectorStore`) - pgvector column, IVFFlat cosine index, ranking in SQL
//! - **Fallback** (`JsonVectorStore`) - JSONB float array, full scan, ranking in process
//!
//! The strategy is chosen once, at construction, and never re-evaluated.

use async_trait::async_trait;
use membrane_core::config::{ModePreference, VectorStoreConfig};
use membrane_core::{MemoryRecord, NewMemoryRecord, ScoredMemory, StoreMode};
use sqlx::PgPool;
use thiserror::Error;

use super::fallback::JsonVectorStore;
use super::native::PgVectorStore;
use super::schema;

/// Result of an insert. Duplicate content within a collection is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Persistent table of (collection, content, embedding, metadata) rows.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn mode(&self) -> StoreMode;

    /// Insert a record; `Duplicate` when (collection, content) already exists.
    async fn insert(&self, record: &NewMemoryRecord) -> Result<InsertOutcome, sqlx::Error>;

    /// Up to `top_k` records of `collection` ranked by cosine similarity to `query`.
    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>, sqlx::Error>;

    /// All records of `collection` in insertion order.
    async fn records(&self, collection: &str) -> Result<Vec<MemoryRecord>, sqlx::Error>;

    async fn count(&self, collection: &str) -> Result<u64, sqlx::Error>;

    /// Remove every record of `collection`. Returns the number removed.
    async fn delete_collection(&self, collection: &str) -> Result<u64, sqlx::Error>;
}

#[derive(Error, Debug)]
pub enum StoreInitError {
    #[error("{0}")]
    InvalidTable(String),

    #[error("pgvector required but unavailable: {0}")]
    NativeUnavailable(#[source] sqlx::Error),

    #[error("Schema setup failed: {0}")]
    Schema(#[from] sqlx::Error),
}

/// Decide the store mode and prepare the table for it.
pub async fn create_store(
    pool: PgPool,
    config: &VectorStoreConfig,
    dimensions: usize,
) -> Result<Box<dyn VectorStore>, StoreInitError> {
    schema::validate_table_name(&config.table).map_err(StoreInitError::InvalidTable)?;

    let mode = match config.mode {
        ModePreference::Fallback => StoreMode::Fallback,
        ModePreference::Native => {
            let version = schema::detect_native(&pool)
                .await
                .map_err(StoreInitError::NativeUnavailable)?;
            tracing::info!(pgvector = %version, "pgvector available");
            StoreMode::Native
        }
        ModePreference::Auto => match schema::detect_native(&pool).await {
            Ok(version) => {
                tracing::info!(pgvector = %version, "pgvector available, using native vector index");
                StoreMode::Native
            }
            Err(e) => {
                tracing::warn!(error = %e, "pgvector unavailable, falling back to in-process similarity");
                StoreMode::Fallback
            }
        },
    };

    let mode = match schema::ensure_schema(&pool, &config.table, mode, dimensions, config.ivfflat_lists).await {
        Ok(_) => mode,
        Err(e) if mode == StoreMode::Native && config.mode == ModePreference::Auto => {
            tracing::warn!(error = %e, "Native schema setup failed, falling back to in-process similarity");
            schema::ensure_schema(&pool, &config.table, StoreMode::Fallback, dimensions, config.ivfflat_lists)
                .await?;
            StoreMode::Fallback
        }
        Err(e) => return Err(e.into()),
    };

    let store: Box<dyn VectorStore> = match mode {
        StoreMode::Native => Box::new(PgVectorStore::new(
            pool,
            config.table.clone(),
            config.effective_probes(),
            dimensions,
        )),
        StoreMode::Fallback => Box::new(JsonVectorStore::new(pool, config.table.clone(), dimensions)),
    };

    tracing::info!(table = %config.table, mode = %store.mode(), "Vector store initialized");
    Ok(store)
}

// ============================================================================
// SQL shared by both strategies
// ============================================================================

pub(crate) async fn count_rows(pool: &PgPool, table: &str, collection: &str) -> Result<u64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {} WHERE collection = $1", table))
        .bind(collection)
        .fetch_one(pool)
        .await?;
    Ok(row.0.max(0) as u64)
}

pub(crate) async fn delete_rows(pool: &PgPool, table: &str, collection: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE collection = $1", table))
        .bind(collection)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (collection, content, embedding, metadata) VALUES ($1, $2, $3, $4) \
         ON CONFLICT DO NOTHING",
        table
    )
}

/// Embeddings must have exactly the store's dimension.
pub(crate) fn check_dimensions(embedding: &[f32], dimensions: usize) -> Result<(), sqlx::Error> {
    if embedding.len() == dimensions {
        Ok(())
    } else {
        Err(sqlx::Error::Encode(
            format!(
                "embedding has {} dimensions, store expects {}",
                embedding.len(),
                dimensions
            )
            .into(),
        ))
    }
}

pub(crate) fn insert_outcome(rows_affected: u64) -> InsertOutcome {
    if rows_affected == 0 {
        InsertOutcome::Duplicate
    } else {
        InsertOutcome::Inserted
    }
}

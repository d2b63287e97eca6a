//! Fallback store - embeddings as JSONB float arrays, no index.
//!
//! Search loads every row of the collection and ranks it in process with
//! cosine similarity. O(collection size) per query; collections are
//! per-tenant and small, so there is no pagination.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use membrane_core::similarity::rank_top_k;
use membrane_core::{MemoryRecord, Metadata, NewMemoryRecord, ScoredMemory, StoreMode};
use sqlx::types::Json;
use sqlx::PgPool;

use super::vector_store::{self, InsertOutcome, VectorStore};

pub struct JsonVectorStore {
    pool: PgPool,
    table: String,
    dimensions: usize,
}

impl JsonVectorStore {
    pub fn new(pool: PgPool, table: String, dimensions: usize) -> Self {
        Self {
            pool,
            table,
            dimensions,
        }
    }
}

#[derive(sqlx::FromRow)]
struct JsonRow {
    id: i64,
    collection: String,
    content: String,
    embedding: Json<Vec<f32>>,
    metadata: Option<Json<Metadata>>,
    created_at: DateTime<Utc>,
}

impl From<JsonRow> for MemoryRecord {
    fn from(row: JsonRow) -> Self {
        MemoryRecord {
            id: row.id,
            collection: row.collection,
            content: row.content,
            embedding: row.embedding.0,
            metadata: row.metadata.map(|m| m.0),
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl VectorStore for JsonVectorStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Fallback
    }

    async fn insert(&self, record: &NewMemoryRecord) -> Result<InsertOutcome, sqlx::Error> {
        vector_store::check_dimensions(&record.embedding, self.dimensions)?;

        let result = sqlx::query(&vector_store::insert_sql(&self.table))
            .bind(&record.collection)
            .bind(&record.content)
            .bind(Json(record.embedding.clone()))
            .bind(record.metadata.clone().map(Json))
            .execute(&self.pool)
            .await?;

        Ok(vector_store::insert_outcome(result.rows_affected()))
    }

    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>, sqlx::Error> {
        vector_store::check_dimensions(query, self.dimensions)?;

        let records = self.records(collection).await?;
        tracing::debug!(
            collection = collection,
            scanned = records.len(),
            "Ranking collection in process"
        );
        Ok(rank_top_k(records, query, top_k))
    }

    async fn records(&self, collection: &str) -> Result<Vec<MemoryRecord>, sqlx::Error> {
        let rows: Vec<JsonRow> = sqlx::query_as(&format!(
            "SELECT id, collection, content, embedding, metadata, created_at \
             FROM {} WHERE collection = $1 ORDER BY id",
            self.table
        ))
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MemoryRecord::from).collect())
    }

    async fn count(&self, collection: &str) -> Result<u64, sqlx::Error> {
        vector_store::count_rows(&self.pool, &self.table, collection).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<u64, sqlx::Error> {
        vector_store::delete_rows(&self.pool, &self.table, collection).await
    }
}

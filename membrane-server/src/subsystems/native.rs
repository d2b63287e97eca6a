//! Native store - pgvector column with an IVFFlat cosine index.
//!
//! Ranking happens server-side through the `<=>` cosine-distance operator;
//! score = 1 - distance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use membrane_core::{MemoryRecord, Metadata, NewMemoryRecord, ScoredMemory, StoreMode};
use pgvector::Vector;
use sqlx::types::Json;
use sqlx::PgPool;

use super::vector_store::{self, InsertOutcome, VectorStore};

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    probes: u32,
    dimensions: usize,
}

impl PgVectorStore {
    pub fn new(pool: PgPool, table: String, probes: u32, dimensions: usize) -> Self {
        Self {
            pool,
            table,
            probes: probes.max(1),
            dimensions,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NativeRow {
    id: i64,
    collection: String,
    content: String,
    embedding: Vector,
    metadata: Option<Json<Metadata>>,
    created_at: DateTime<Utc>,
}

impl From<NativeRow> for MemoryRecord {
    fn from(row: NativeRow) -> Self {
        MemoryRecord {
            id: row.id,
            collection: row.collection,
            content: row.content,
            embedding: row.embedding.to_vec(),
            metadata: row.metadata.map(|m| m.0),
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Native
    }

    async fn insert(&self, record: &NewMemoryRecord) -> Result<InsertOutcome, sqlx::Error> {
        vector_store::check_dimensions(&record.embedding, self.dimensions)?;

        let vector = Vector::from(record.embedding.clone());
        let result = sqlx::query(&vector_store::insert_sql(&self.table))
            .bind(&record.collection)
            .bind(&record.content)
            .bind(&vector)
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
        if top_k == 0 {
            return Ok(Vec::new());
        }
        vector_store::check_dimensions(query, self.dimensions)?;

        let vector = Vector::from(query.to_vec());
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; probes is a plain integer.
        sqlx::query(&format!("SET LOCAL ivfflat.probes = {}", self.probes))
            .execute(&mut *tx)
            .await?;

        let rows: Vec<(i64, String, f32, Option<Json<Metadata>>)> = sqlx::query_as(&format!(
            r#"
            SELECT id, content, (1 - (embedding <=> $2))::float4 AS score, metadata
            FROM {}
            WHERE collection = $1
            ORDER BY embedding <=> $2, id
            LIMIT $3
            "#,
            self.table
        ))
        .bind(collection)
        .bind(&vector)
        .bind(top_k as i64)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(id, content, score, metadata)| ScoredMemory {
                id,
                content,
                score: if score.is_nan() { 0.0 } else { score },
                metadata: metadata.map(|m| m.0),
            })
            .collect())
    }

    async fn records(&self, collection: &str) -> Result<Vec<MemoryRecord>, sqlx::Error> {
        let rows: Vec<NativeRow> = sqlx::query_as(&format!(
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

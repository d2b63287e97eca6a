//! Vector memory service - the façade the rest of the application calls.
//!
//! - `add` embeds content and stores it once per (collection, content)
//! - `search` embeds the query and returns the closest contents, best-effort
//! - `delete_collection` drops a whole collection, best-effort
//!
//! Semantic memory is an enhancement, never a hard dependency: when no
//! database is reachable the service runs disabled and every operation is a
//! safe no-op. `search` never fails; it logs and returns nothing instead.

use std::sync::Arc;

use membrane_core::models::{validate_metadata, validate_text};
use membrane_core::{
    db, EmbeddingBackend, MembraneConfig, MemoryError, MemoryRecord, Metadata, NewMemoryRecord,
    ScoredMemory, StoreMode,
};
use sqlx::PgPool;

use super::embedder::create_backend_from_config;
use super::vector_store::{create_store, InsertOutcome, VectorStore};

/// What `add` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Same content already stored in this collection; nothing written.
    Duplicate,
    /// Service disabled; nothing written.
    Skipped,
}

struct ActiveMemory {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingBackend>,
}

#[derive(Clone)]
pub struct VectorMemory {
    inner: Option<Arc<ActiveMemory>>,
}

/// Open the configured database, or explain why there is none.
pub async fn connect(config: &MembraneConfig) -> Result<PgPool, MemoryError> {
    let url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| MemoryError::StoreUnreachable("no database configured".to_string()))?;

    db::create_pool(&config.database, url)
        .await
        .map_err(|e| MemoryError::StoreUnreachable(e.to_string()))
}

impl VectorMemory {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            inner: Some(Arc::new(ActiveMemory { store, embedder })),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Build the service on `pool`. Never fails: any problem leaves it disabled.
    pub async fn initialize(config: &MembraneConfig, pool: Option<PgPool>) -> Self {
        let result = match pool {
            Some(pool) => Self::with_pool(pool, config).await,
            None => Err(MemoryError::StoreUnreachable(
                "no database connection".to_string(),
            )),
        };

        match result {
            Ok(memory) => memory,
            Err(e) => {
                tracing::warn!(error = %e, "Vector memory disabled, continuing without semantic memory");
                Self::disabled()
            }
        }
    }

    pub async fn with_pool(pool: PgPool, config: &MembraneConfig) -> Result<Self, MemoryError> {
        let embedder = create_backend_from_config(config)?;
        let store = create_store(pool, &config.vector_store, embedder.dimensions())
            .await
            .map_err(|e| MemoryError::StoreUnreachable(e.to_string()))?;

        tracing::info!(
            mode = %store.mode(),
            embedder = embedder.name(),
            "Vector memory enabled"
        );
        Ok(Self::new(Arc::from(store), Arc::from(embedder)))
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn mode(&self) -> Option<StoreMode> {
        self.inner.as_ref().map(|m| m.store.mode())
    }

    /// Embed `content` and store it in `collection`.
    ///
    /// Embedding failures and genuine write failures are returned so the caller
    /// can retry; duplicate content is a successful no-op.
    pub async fn add(
        &self,
        collection: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<AddOutcome, MemoryError> {
        let Some(active) = &self.inner else {
            tracing::debug!(collection = collection, "Vector memory disabled, add skipped");
            return Ok(AddOutcome::Skipped);
        };

        if content.trim().is_empty() {
            return Err(MemoryError::EmptyContent);
        }
        validate_text("content", content).map_err(MemoryError::InvalidText)?;
        validate_text("collection", collection).map_err(MemoryError::InvalidText)?;
        if let Some(metadata) = &metadata {
            validate_metadata(metadata).map_err(MemoryError::InvalidMetadata)?;
        }

        let embedding = active.embedder.embed(content).await.map_err(|e| {
            tracing::error!(collection = collection, error = %e, "Failed to embed memory content");
            MemoryError::EmbeddingUnavailable(e)
        })?;

        let record = NewMemoryRecord {
            collection: collection.to_string(),
            content: content.to_string(),
            embedding,
            metadata,
        };

        match active.store.insert(&record).await {
            Ok(InsertOutcome::Inserted) => {
                tracing::info!(collection = collection, chars = content.len(), "Memory added");
                Ok(AddOutcome::Inserted)
            }
            Ok(InsertOutcome::Duplicate) => {
                tracing::debug!(collection = collection, "Memory already present, skipped");
                Ok(AddOutcome::Duplicate)
            }
            Err(e) => {
                tracing::error!(collection = collection, error = %e, "Failed to store memory");
                Err(MemoryError::StoreWrite(e))
            }
        }
    }

    /// Contents of the `top_k` memories closest to `query`, most similar first.
    pub async fn search(&self, collection: &str, query: &str, top_k: usize) -> Vec<String> {
        self.search_scored(collection, query, top_k)
            .await
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    /// Like `search`, keeping ids, scores and metadata.
    pub async fn search_scored(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Vec<ScoredMemory> {
        let Some(active) = &self.inner else {
            return Vec::new();
        };
        if top_k == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        match active.store.count(collection).await {
            Ok(0) => return Vec::new(),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(collection = collection, error = %e, "Memory search failed");
                return Vec::new();
            }
        }

        let embedding = match active.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(collection = collection, error = %e, "Failed to embed search query");
                return Vec::new();
            }
        };

        match active.store.nearest(collection, &embedding, top_k).await {
            Ok(results) => {
                tracing::debug!(collection = collection, found = results.len(), "Memory search");
                results
            }
            Err(e) => {
                tracing::warn!(collection = collection, error = %e, "Memory search failed");
                Vec::new()
            }
        }
    }

    /// Remove every memory of `collection`. Failures are logged, not returned.
    pub async fn delete_collection(&self, collection: &str) {
        let Some(active) = &self.inner else {
            return;
        };

        match active.store.delete_collection(collection).await {
            Ok(removed) => tracing::info!(collection = collection, removed, "Memory collection deleted"),
            Err(e) => tracing::error!(collection = collection, error = %e, "Failed to delete memory collection"),
        }
    }

    /// Number of memories in `collection`; 0 when disabled or on failure.
    pub async fn count(&self, collection: &str) -> u64 {
        let Some(active) = &self.inner else {
            return 0;
        };
        active.store.count(collection).await.unwrap_or_else(|e| {
            tracing::warn!(collection = collection, error = %e, "Failed to count memories");
            0
        })
    }

    /// Stored records of `collection`; empty when disabled or on failure.
    pub async fn records(&self, collection: &str) -> Vec<MemoryRecord> {
        let Some(active) = &self.inner else {
            return Vec::new();
        };
        active.store.records(collection).await.unwrap_or_else(|e| {
            tracing::warn!(collection = collection, error = %e, "Failed to list memories");
            Vec::new()
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

use membrane_core::ipc::{MembraneRequest, MembraneResponse};
use membrane_core::{db, MemoryError, Metadata};

use crate::subsystems::AddOutcome;
use crate::AppState;

/// Results returned when a search does not say how many it wants
pub const DEFAULT_TOP_K: usize = 5;

/// Upper bound on results per search
pub const MAX_TOP_K: usize = 50;

pub fn clamp_top_k(top_k: Option<u32>) -> usize {
    top_k
        .map(|k| (k as usize).clamp(1, MAX_TOP_K))
        .unwrap_or(DEFAULT_TOP_K)
}

pub async fn handle_request(request: MembraneRequest, state: &AppState) -> MembraneResponse {
    match request {
        MembraneRequest::Ping => MembraneResponse::pong(),
        MembraneRequest::Health => MembraneResponse::ok(health_report(state).await),
        MembraneRequest::Add {
            collection,
            content,
            metadata,
        } => match add_memory(state, &collection, &content, metadata).await {
            Ok(data) => MembraneResponse::ok(data),
            Err(e) => MembraneResponse::err(e.to_string()),
        },
        MembraneRequest::Search {
            collection,
            query,
            top_k,
        } => MembraneResponse::ok(search_memories(state, &collection, &query, top_k).await),
        MembraneRequest::DeleteCollection { collection } => {
            MembraneResponse::ok(delete_collection(state, &collection).await)
        }
    }
}

/// Database, pgvector and memory-service status. Never fails.
pub async fn health_report(state: &AppState) -> serde_json::Value {
    let (postgresql, pgvector) = match &state.pool {
        Some(pool) => (
            db::health_check(pool).await.ok(),
            db::check_pgvector(pool).await.ok(),
        ),
        None => (None, None),
    };

    let status = if state.memory.is_enabled() && postgresql.is_some() {
        "healthy"
    } else {
        "degraded"
    };

    serde_json::json!({
        "status": status,
        "postgresql": postgresql,
        "pgvector": pgvector,
        "memory_enabled": state.memory.is_enabled(),
        "mode": state.memory.mode(),
    })
}

pub async fn add_memory(
    state: &AppState,
    collection: &str,
    content: &str,
    metadata: Option<Metadata>,
) -> Result<serde_json::Value, MemoryError> {
    let outcome = state.memory.add(collection, content, metadata).await?;

    Ok(serde_json::json!({
        "collection": collection,
        "stored": outcome == AddOutcome::Inserted,
        "duplicate": outcome == AddOutcome::Duplicate,
        "enabled": outcome != AddOutcome::Skipped,
    }))
}

pub async fn search_memories(
    state: &AppState,
    collection: &str,
    query: &str,
    top_k: Option<u32>,
) -> serde_json::Value {
    let results = state
        .memory
        .search_scored(collection, query, clamp_top_k(top_k))
        .await;

    serde_json::json!({
        "collection": collection,
        "query": query,
        "count": results.len(),
        "results": results,
    })
}

pub async fn delete_collection(state: &AppState, collection: &str) -> serde_json::Value {
    state.memory.delete_collection(collection).await;
    serde_json::json!({
        "collection": collection,
        "deleted": state.memory.is_enabled(),
    })
}

//! Membrane HTTP REST API
//!
//! Axum-based HTTP server that exposes the vector memory over HTTP for the
//! application's route layer. Runs alongside the Unix socket IPC server on
//! port 8767 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to a pure inner
//! function, so the logic is testable without axum dispatch.
//!
//! Endpoints:
//! - GET    /health                             - database and memory status
//! - GET    /version                            - server version info
//! - POST   /collections/:collection/memories   - add a memory
//! - POST   /collections/:collection/search     - semantic search
//! - GET    /collections/:collection/count      - number of stored memories
//! - DELETE /collections/:collection            - delete a collection

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use membrane_core::{MemoryError, Metadata};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router;
use crate::AppState;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/collections/:collection/memories", post(add_handler))
        .route("/collections/:collection/search", post(search_handler))
        .route("/collections/:collection/count", get(count_handler))
        .route("/collections/:collection", delete(delete_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Membrane HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub top_k: Option<u32>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn error_body(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    let body = serde_json::to_value(ErrorResponse::new(msg)).unwrap_or_default();
    (status, body)
}

/// HTTP status for a failed add.
pub fn status_for(error: &MemoryError) -> StatusCode {
    match error {
        MemoryError::EmptyContent
        | MemoryError::InvalidMetadata(_)
        | MemoryError::InvalidText(_) => StatusCode::BAD_REQUEST,
        MemoryError::EmbeddingUnavailable(_) => StatusCode::BAD_GATEWAY,
        MemoryError::StoreUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        MemoryError::StoreWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health - 200 when the memory service is enabled, 503 otherwise.
pub async fn health_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    let mut report = router::health_report(state).await;
    if let Some(obj) = report.as_object_mut() {
        obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
        obj.insert(
            "socket".to_string(),
            serde_json::json!(state.config.service.socket_path),
        );
    }

    let status = if state.memory.is_enabled() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, report)
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "membrane/1",
    })
}

/// Inner add - validates content, then embeds and stores it.
pub async fn add_inner(
    state: &AppState,
    collection: &str,
    req: AddRequest,
) -> (StatusCode, serde_json::Value) {
    let content = match req.content {
        Some(c) if !c.trim().is_empty() => c,
        _ => return error_body(StatusCode::BAD_REQUEST, "content field is required"),
    };

    match router::add_memory(state, collection, &content, req.metadata).await {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => error_body(status_for(&e), e.to_string()),
    }
}

/// Inner search - validates query; retrieval itself never fails.
pub async fn search_inner(
    state: &AppState,
    collection: &str,
    req: SearchRequest,
) -> (StatusCode, serde_json::Value) {
    let query = match req.query {
        Some(q) if !q.trim().is_empty() => q,
        _ => return error_body(StatusCode::BAD_REQUEST, "query field is required"),
    };

    let start = Instant::now();
    let mut data = router::search_memories(state, collection, &query, req.top_k).await;
    let took_ms = start.elapsed().as_millis() as u64;

    if let Some(obj) = data.as_object_mut() {
        obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
    }
    (StatusCode::OK, data)
}

pub async fn count_inner(state: &AppState, collection: &str) -> (StatusCode, serde_json::Value) {
    let count = state.memory.count(collection).await;
    (
        StatusCode::OK,
        serde_json::json!({ "collection": collection, "count": count }),
    )
}

pub async fn delete_inner(state: &AppState, collection: &str) -> (StatusCode, serde_json::Value) {
    (StatusCode::OK, router::delete_collection(state, collection).await)
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<AddRequest>,
) -> impl IntoResponse {
    let (status, body) = add_inner(&state, &collection, req).await;
    (status, Json(body))
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let (status, body) = search_inner(&state, &collection, req).await;
    (status, Json(body))
}

pub async fn count_handler(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> impl IntoResponse {
    let (status, body) = count_inner(&state, &collection).await;
    (status, Json(body))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_inner(&state, &collection).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::VectorMemory;
    use membrane_core::{EmbeddingError, MembraneConfig};

    fn disabled_state() -> AppState {
        AppState {
            memory: VectorMemory::disabled(),
            pool: None,
            config: MembraneConfig::from_toml_str(
                r#"
                [service]
                socket_path = "/tmp/membrane-test.sock"
                log_level = "info"
                "#,
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "membrane/1");
    }

    #[test]
    fn test_status_for_maps_error_kinds() {
        assert_eq!(status_for(&MemoryError::EmptyContent), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&MemoryError::InvalidMetadata("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&MemoryError::InvalidText("content contains a NUL byte".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&MemoryError::EmbeddingUnavailable(EmbeddingError::MissingEmbedding)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&MemoryError::StoreWrite(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_add_inner_requires_content() {
        let state = disabled_state();

        let (status, body) = add_inner(
            &state,
            "user_1_project_1",
            AddRequest {
                content: Some("   ".to_string()),
                metadata: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = add_inner(
            &state,
            "user_1_project_1",
            AddRequest {
                content: None,
                metadata: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_inner_disabled_is_ok_but_not_stored() {
        let (status, body) = add_inner(
            &disabled_state(),
            "user_1_project_1",
            AddRequest {
                content: Some("The dragon lives in the mountain".to_string()),
                metadata: None,
            },
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored"], false);
        assert_eq!(body["enabled"], false);
    }

    #[tokio::test]
    async fn test_search_inner_requires_query() {
        let (status, body) = search_inner(
            &disabled_state(),
            "user_1_project_1",
            SearchRequest {
                query: Some("".to_string()),
                top_k: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_search_inner_disabled_returns_empty_results() {
        let (status, body) = search_inner(
            &disabled_state(),
            "user_1_project_1",
            SearchRequest {
                query: Some("Where does the dragon live?".to_string()),
                top_k: Some(3),
            },
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert!(body["results"].as_array().unwrap().is_empty());
        assert!(body["took_ms"].is_number());
    }

    #[tokio::test]
    async fn test_health_inner_disabled_is_unavailable() {
        let (status, body) = health_inner(&disabled_state()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["memory_enabled"], false);
        assert_eq!(body["socket"], "/tmp/membrane-test.sock");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}

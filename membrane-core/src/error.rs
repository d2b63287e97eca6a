use thiserror::Error;

use crate::embeddings::EmbeddingError;

#[derive(Error, Debug)]
pub enum MembraneError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Other error: {0}")]
    Other(String),
}

/// Failures of the vector memory operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Upstream embedding call failed: network, timeout, or malformed response.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    /// Insert failed for a reason other than the duplicate-content case.
    #[error("Store write failed: {0}")]
    StoreWrite(#[source] sqlx::Error),

    /// Persistence backend missing or unreachable at initialization.
    #[error("Store unreachable: {0}")]
    StoreUnreachable(String),

    #[error("Content must not be empty")]
    EmptyContent,

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Text PostgreSQL cannot store, such as an embedded NUL byte.
    #[error("Invalid text: {0}")]
    InvalidText(String),
}

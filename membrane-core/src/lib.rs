pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod ipc;
pub mod models;
pub mod similarity;

pub use config::MembraneConfig;
pub use embeddings::{
    create_backend, BackendConfig, EmbeddingBackend, EmbeddingError, EmbeddingSettings,
    HashingEmbedder, OpenRouterEmbeddingClient, EMBEDDING_DIMENSIONS,
};
pub use error::{MembraneError, MemoryError};
pub use models::{MemoryRecord, Metadata, NewMemoryRecord, ScoredMemory, StoreMode};

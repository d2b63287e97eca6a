//! Embedder subsystem - builds the configured embedding backend.

use membrane_core::{
    embeddings::{BackendConfig, EmbeddingBackend, EmbeddingError},
    MembraneConfig,
};

/// Create an embedding backend from the application config.
///
/// Reads `[embedding] backend` to select OpenRouter or the local hashing embedder.
pub fn create_backend_from_config(
    config: &MembraneConfig,
) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    let backend_cfg = match config.embedding.backend.as_str() {
        "hashing" => BackendConfig::Hashing {
            dimensions: config.embedding.dimensions,
        },
        other => {
            if other != "openrouter" {
                tracing::warn!(backend = other, "Unknown embedding backend, using openrouter");
            }
            BackendConfig::OpenRouter(config.embedding.settings())
        }
    };

    membrane_core::embeddings::create_backend(backend_cfg)
}

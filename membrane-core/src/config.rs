use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::embeddings::{EmbeddingSettings, EMBEDDING_DIMENSIONS};

#[derive(Debug, Deserialize, Clone)]
pub struct MembraneConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Absent means no persistence backend: the memory service runs disabled.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            acquire_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `openrouter` (default) or `hashing` for offline development.
    pub backend: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout_seconds: u64,
    pub referer: String,
    pub title: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "openrouter".to_string(),
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/text-embedding-3-small".to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
            timeout_seconds: 30,
            referer: "https://membrane.app".to_string(),
            title: "The Membrane".to_string(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve into client settings. The API key falls back to `OPENROUTER_API_KEY`.
    pub fn settings(&self) -> EmbeddingSettings {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .unwrap_or_default();

        EmbeddingSettings {
            api_key,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            timeout_seconds: self.timeout_seconds,
            referer: self.referer.clone(),
            title: self.title.clone(),
        }
    }
}

/// How the vector store picks its storage strategy.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModePreference {
    /// Use pgvector when the extension is available.
    #[default]
    Auto,
    /// Require pgvector; the service is disabled without it.
    Native,
    /// Never use pgvector; always store embeddings as JSONB.
    Fallback,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub table: String,
    pub mode: ModePreference,
    pub ivfflat_lists: u32,
    /// Lists scanned per native query. Unset means every list, which keeps
    /// native results identical to an exact scan of the collection.
    pub ivfflat_probes: Option<u32>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            table: "memory_records".to_string(),
            mode: ModePreference::Auto,
            ivfflat_lists: 100,
            ivfflat_probes: None,
        }
    }
}

impl VectorStoreConfig {
    /// Probes actually used: the configured value, else all lists, never above `ivfflat_lists`.
    pub fn effective_probes(&self) -> u32 {
        let lists = self.ivfflat_lists.max(1);
        self.ivfflat_probes.unwrap_or(lists).clamp(1, lists)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8767,
        }
    }
}

impl MembraneConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("MEMBRANE").separator("__"))
            .build()?;
        s.try_deserialize::<Self>().map(Self::with_env_fallbacks)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        s.try_deserialize()
    }

    /// `DATABASE_URL` is the conventional deployment variable; honour it when
    /// the file leaves the URL unset.
    fn with_env_fallbacks(mut self) -> Self {
        if self.database.url.as_deref().map_or(true, str::is_empty) {
            self.database.url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        }
        self
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-defined tags attached to a memory, e.g. `{"source": "notes.txt", "type": "training"}`.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One ingested unit of text within one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub collection: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
}

/// Insert-side shape of a record; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewMemoryRecord {
    pub collection: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Option<Metadata>,
}

/// A search hit. `score` is cosine similarity, higher is closer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMemory {
    pub id: i64,
    pub content: String,
    pub score: f32,
    pub metadata: Option<Metadata>,
}

/// Physical encoding of the `embedding` column, fixed for a store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// pgvector `vector(N)` column with an IVFFlat cosine index.
    Native,
    /// JSONB float array, no index, ranked in process.
    Fallback,
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreMode::Native => write!(f, "native"),
            StoreMode::Fallback => write!(f, "fallback"),
        }
    }
}

/// Collection naming convention of the host application: one per user+project.
pub fn collection_name(user_id: i64, project_id: i64) -> String {
    format!("user_{}_project_{}", user_id, project_id)
}

/// Metadata values must be JSON scalars. Returns the offending key otherwise.
pub fn validate_metadata(metadata: &Metadata) -> Result<(), String> {
    if let Some((key, _)) = metadata.iter().find(|(_, v)| !is_scalar(v)) {
        return Err(format!("metadata value for '{}' must be a string, number or bool", key));
    }
    let nul = metadata
        .iter()
        .find(|(k, v)| k.contains('\0') || v.as_str().is_some_and(|s| s.contains('\0')));
    match nul {
        Some((key, _)) => Err(format!("metadata entry '{}' contains a NUL byte", key.escape_debug())),
        None => Ok(()),
    }
}

/// PostgreSQL text cannot hold NUL bytes.
pub fn validate_text(field: &str, value: &str) -> Result<(), String> {
    if value.contains('\0') {
        Err(format!("{} contains a NUL byte", field))
    } else {
        Ok(())
    }
}

fn is_scalar(value: &serde_json::Value) -> bool {
    matches!(
        value,
        serde_json::Value::String(_) | serde_json::Value::Number(_) | serde_json::Value::Bool(_)
    )
}

//! Schema management for the memory table
//!
//! - Probing for pgvector (`CREATE EXTENSION IF NOT EXISTS vector`)
//! - Creating the table and its indexes for the chosen store mode
//! - Dropping and recreating a table whose shape belongs to the other mode
//!
//! The table is a derived index over source documents, so recreation is
//! destructive: no rows are carried between modes.

use std::collections::{HashMap, HashSet};

use membrane_core::{db, StoreMode};
use sqlx::PgPool;

/// Columns every memory table must have, whatever the mode.
const REQUIRED_COLUMNS: [&str; 6] = ["id", "collection", "content", "embedding", "metadata", "created_at"];

/// Table names are interpolated into DDL, so only plain identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<(), String> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && table.len() <= 48 {
        Ok(())
    } else {
        Err(format!(
            "invalid table name '{}': use lowercase letters, digits and underscores (max 48)",
            table
        ))
    }
}

/// Check for a native vector type. Returns the pgvector version on success.
pub async fn detect_native(pool: &PgPool) -> Result<String, sqlx::Error> {
    db::enable_pgvector(pool).await
}

/// Column type the embedding must have for `mode`, as printed by `format_type`.
pub fn expected_embedding_type(mode: StoreMode, dimensions: usize) -> String {
    match mode {
        StoreMode::Native => format!("vector({})", dimensions),
        StoreMode::Fallback => "jsonb".to_string(),
    }
}

/// Name of the CHECK constraint pinning fallback embeddings to `dimensions` floats.
///
/// The dimension is part of the name so a changed dimension reads as a shape mismatch.
pub fn dimension_constraint_name(table: &str, dimensions: usize) -> String {
    format!("{}_dim_{}", table, dimensions)
}

/// CHECK constraint the table must carry for `mode`; native mode relies on `vector(N)`.
pub fn expected_constraint(table: &str, mode: StoreMode, dimensions: usize) -> Option<String> {
    match mode {
        StoreMode::Native => None,
        StoreMode::Fallback => Some(dimension_constraint_name(table, dimensions)),
    }
}

/// Current columns of `table` (name → type), empty when the table does not exist.
async fn table_columns(pool: &PgPool, table: &str) -> Result<HashMap<String, String>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)
        FROM pg_attribute a
        JOIN pg_class c ON c.oid = a.attrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = current_schema()
          AND c.relname = $1
          AND c.relkind = 'r'
          AND a.attnum > 0
          AND NOT a.attisdropped
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Names of the CHECK constraints on `table`.
async fn check_constraints(pool: &PgPool, table: &str) -> Result<HashSet<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT con.conname::text
        FROM pg_constraint con
        JOIN pg_class c ON c.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = current_schema()
          AND c.relname = $1
          AND con.contype = 'c'
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Whether an existing table's columns and constraints fit the expected shape.
pub fn shape_matches(
    columns: &HashMap<String, String>,
    constraints: &HashSet<String>,
    expected_embedding: &str,
    expected_constraint: Option<&str>,
) -> bool {
    REQUIRED_COLUMNS.iter().all(|c| columns.contains_key(*c))
        && columns.get("embedding").map(String::as_str) == Some(expected_embedding)
        && expected_constraint.map_or(true, |name| constraints.contains(name))
}

/// Make sure `table` exists with the shape `mode` needs, recreating it if not.
///
/// Returns `true` when an incompatible table was dropped.
pub async fn ensure_schema(
    pool: &PgPool,
    table: &str,
    mode: StoreMode,
    dimensions: usize,
    ivfflat_lists: u32,
) -> Result<bool, sqlx::Error> {
    let expected = expected_embedding_type(mode, dimensions);
    let constraint = expected_constraint(table, mode, dimensions);
    let columns = table_columns(pool, table).await?;
    let constraints = if columns.is_empty() {
        HashSet::new()
    } else {
        check_constraints(pool, table).await?
    };

    let recreated = !columns.is_empty()
        && !shape_matches(&columns, &constraints, &expected, constraint.as_deref());
    if recreated {
        tracing::warn!(
            table = table,
            found = columns.get("embedding").map(String::as_str).unwrap_or("none"),
            expected = %expected,
            dimensions,
            "Memory table shape does not match store mode, dropping and recreating"
        );
        sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
            .execute(pool)
            .await?;
    }

    let dimension_check = match &constraint {
        Some(name) => format!(
            ",\n            CONSTRAINT {name} CHECK (jsonb_array_length(embedding) = {dimensions})"
        ),
        None => String::new(),
    };

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            collection TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding {expected} NOT NULL,
            metadata JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(){dimension_check}
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {table}_collection_idx ON {table} (collection)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {table}_collection_content_key ON {table} (collection, md5(content))"
    ))
    .execute(pool)
    .await?;

    if mode == StoreMode::Native {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} \
             USING ivfflat (embedding vector_cosine_ops) WITH (lists = {})",
            ivfflat_lists.max(1)
        ))
        .execute(pool)
        .await?;
    }

    tracing::info!(table = table, mode = %mode, dimensions, "Memory table ready");
    Ok(recreated)
}

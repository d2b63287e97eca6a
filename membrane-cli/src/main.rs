//! membrane-cli - operator frontend for the Membrane semantic memory service
//!
//! Talks to the server's HTTP API. Every subcommand targets one collection,
//! given either directly (`--collection`) or as `--user <id> --project <id>`,
//! which maps to the application's `user_{id}_project_{id}` naming.
//!
//! # Subcommands
//! - `add <content> [-m key=value]...`  - store a memory
//! - `search <query> [-n <limit>] [--json]` - semantic search
//! - `count`                             - number of memories in the collection
//! - `delete`                            - delete the whole collection
//! - `status`                            - show server health

use clap::{Args, Parser, Subcommand};
use membrane_core::models::collection_name;
use membrane_core::{Metadata, ScoredMemory};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const DEFAULT_LIMIT: u32 = 5;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "membrane-cli", version, about = "Membrane semantic memory CLI")]
struct Cli {
    /// Membrane HTTP server URL (overrides MEMBRANE_HTTP_URL env var)
    #[arg(long, env = "MEMBRANE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct Target {
    /// Collection name
    #[arg(short, long, conflicts_with_all = ["user", "project"])]
    collection: Option<String>,

    /// Owning user id (with --project)
    #[arg(long, requires = "project")]
    user: Option<i64>,

    /// Project id (with --user)
    #[arg(long, requires = "user")]
    project: Option<i64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store a memory in a collection
    Add {
        #[command(flatten)]
        target: Target,

        /// Text to remember
        content: String,

        /// Metadata as key=value, repeatable
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Search a collection semantically
    Search {
        #[command(flatten)]
        target: Target,

        /// Query text to search for
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Print the raw JSON results
        #[arg(long)]
        json: bool,
    },

    /// Count memories in a collection
    Count {
        #[command(flatten)]
        target: Target,
    },

    /// Delete every memory in a collection
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Show Membrane server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// The search response from POST /collections/{collection}/search
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredMemory>,
    pub count: usize,
    pub took_ms: Option<u64>,
}

// ============================================================================
// Argument helpers
// ============================================================================

fn resolve_collection(target: &Target) -> anyhow::Result<String> {
    match (&target.collection, target.user, target.project) {
        (Some(c), _, _) if !c.trim().is_empty() => Ok(c.clone()),
        (_, Some(user), Some(project)) => Ok(collection_name(user, project)),
        _ => anyhow::bail!("a collection is required: use --collection or --user/--project"),
    }
}

/// Parse `key=value` pairs. Numbers and booleans keep their JSON type.
fn parse_metadata(pairs: &[String]) -> anyhow::Result<Option<Metadata>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut metadata = Metadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            anyhow::bail!("metadata must be key=value, got '{}'", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("metadata key must not be empty in '{}'", pair);
        }
        let value = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => v,
            _ => serde_json::Value::String(value.to_string()),
        };
        metadata.insert(key.to_string(), value);
    }
    Ok(Some(metadata))
}

/// One human-readable line block per hit.
fn format_hit(rank: usize, hit: &ScoredMemory) -> String {
    let preview: String = hit.content.chars().take(200).collect();
    format!("{}. [{:.0}%] #{}\n   {}", rank, hit.score * 100.0, hit.id, preview)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

fn read_json(resp: reqwest::blocking::Response) -> anyhow::Result<serde_json::Value> {
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("no details");
        anyhow::bail!("server returned {}: {}", status, message);
    }
    Ok(body)
}

fn do_add(server: &str, collection: &str, content: &str, metadata: Option<Metadata>) -> anyhow::Result<()> {
    let url = format!("{}/collections/{}/memories", server, collection);
    let body = serde_json::json!({ "content": content, "metadata": metadata });
    let resp = read_json(client(60)?.post(&url).json(&body).send()?)?;

    if resp["enabled"] == false {
        println!("Memory service disabled; nothing stored");
    } else if resp["duplicate"] == true {
        println!("Already stored in {}", collection);
    } else {
        println!("Stored in {}", collection);
    }
    Ok(())
}

fn do_search(server: &str, collection: &str, query: &str, limit: u32, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/collections/{}/search", server, collection);
    let body = serde_json::json!({ "query": query, "top_k": limit });
    let resp = read_json(client(60)?.post(&url).json(&body).send()?)?;
    let search: SearchResponse = serde_json::from_value(resp)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&search.results)?);
        return Ok(());
    }

    if search.results.is_empty() {
        eprintln!("No results found for: {}", query);
        return Ok(());
    }
    for (i, hit) in search.results.iter().enumerate() {
        println!("{}\n", format_hit(i + 1, hit));
    }
    if let Some(ms) = search.took_ms {
        eprintln!("{} result(s) in {} ms", search.count, ms);
    }
    Ok(())
}

fn do_count(server: &str, collection: &str) -> anyhow::Result<()> {
    let url = format!("{}/collections/{}/count", server, collection);
    let resp = read_json(client(10)?.get(&url).send()?)?;
    println!("{}", resp["count"].as_u64().unwrap_or(0));
    Ok(())
}

fn do_delete(server: &str, collection: &str) -> anyhow::Result<()> {
    let url = format!("{}/collections/{}", server, collection);
    read_json(client(30)?.delete(&url).send()?)?;
    println!("Deleted {}", collection);
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) => {
            let code = r.status();
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Membrane server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:      {}", body["postgresql"].as_str().unwrap_or("unavailable"));
            println!("pgvector:        {}", body["pgvector"].as_str().unwrap_or("unavailable"));
            println!("Memory:          {}", body["mode"].as_str().unwrap_or("disabled"));
            if !code.is_success() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("membrane-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn run(cli: Cli) -> anyhow::Result<()> {
    let server = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Add { target, content, meta } => {
            let metadata = parse_metadata(&meta)?;
            do_add(&server, &resolve_collection(&target)?, &content, metadata)
        }
        Commands::Search { target, query, limit, json } => {
            do_search(&server, &resolve_collection(&target)?, &query, limit, json)
        }
        Commands::Count { target } => do_count(&server, &resolve_collection(&target)?),
        Commands::Delete { target } => do_delete(&server, &resolve_collection(&target)?),
        Commands::Status => do_status(&server),
    }
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("membrane-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

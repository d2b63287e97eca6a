use clap::Parser;
use membrane_core::MembraneConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use membrane_server::subsystems::{memory, VectorMemory};
use membrane_server::{server, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "membrane.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match MembraneConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // A missing or unreachable database leaves the memory service disabled
    let pool = match memory::connect(&config).await {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(error = %e, "Database unavailable");
            None
        }
    };

    if args.health {
        let Some(pool) = &pool else {
            println!("❌ PostgreSQL not configured or unreachable");
            std::process::exit(1);
        };

        match membrane_core::db::health_check(pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match membrane_core::db::check_pgvector(pool).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => println!("⚠️  pgvector unavailable ({}), fallback mode will be used", e),
        }

        println!("✅ Membrane DB health check passed");
        return Ok(());
    }

    let memory = VectorMemory::initialize(&config, pool.clone()).await;
    let state = AppState {
        memory,
        pool,
        config: config.clone(),
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.http.enabled {
        let http_state = state.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = membrane_server::http::start_http_server(http_state, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}

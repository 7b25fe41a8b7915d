//! EXBANK curriculum service - main entry point
//!
//! Starts the curriculum exercise bank: opens (or creates) the SQLite
//! database and serves the REST API for bulk import, node merging, tree
//! listing, exercise search, and embedding backfill.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exbank_api::api::{self, AppContext};
use exbank_api::config::Config;
use exbank_api::embedding::{EmbeddingClient, EmbeddingConfig};

/// Command-line arguments for exbank-api
#[derive(Parser, Debug)]
#[command(name = "exbank-api")]
#[command(about = "Curriculum exercise bank service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "EXBANK_PORT")]
    port: u16,

    /// SQLite database path
    #[arg(short, long, default_value = "exbank.db", env = "EXBANK_DB_PATH")]
    db_path: PathBuf,

    /// Embedding oracle endpoint; unset disables vector search
    #[arg(long, env = "EXBANK_EMBEDDING_API_URL")]
    embedding_api_url: Option<String>,

    /// Bearer key for the embedding oracle
    #[arg(long, env = "EXBANK_EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Embedding model name
    #[arg(long, env = "EXBANK_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Expected embedding vector length
    #[arg(long, env = "EXBANK_EMBEDDING_DIMENSION")]
    embedding_dimension: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exbank_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config {
        db_path: args.db_path,
        bind_addr: format!("0.0.0.0:{}", args.port),
    };

    info!("Starting EXBANK curriculum service on port {}", args.port);
    info!("Database: {}", config.db_path.display());

    let db_pool = exbank_common::db::init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;

    let embedding = EmbeddingClient::new(EmbeddingConfig {
        api_url: args.embedding_api_url,
        api_key: args.embedding_api_key,
        model: args.embedding_model,
        dimension: args.embedding_dimension,
    });

    let ctx = AppContext {
        db_pool,
        embedding: Arc::new(embedding),
    };

    api::server::run(ctx, &config.bind_addr)
        .await
        .context("HTTP server failed")?;

    Ok(())
}

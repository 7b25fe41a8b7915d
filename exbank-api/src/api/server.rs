//! HTTP server setup and routing

use crate::embedding::EmbeddingClient;
use axum::{
    routing::{get, post},
    Router,
};
use exbank_common::{Error, Result};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: SqlitePool,
    pub embedding: Arc<EmbeddingClient>,
}

/// Build the application router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Curriculum engine
        .route(
            "/curriculum/exercises/import",
            post(super::handlers::import_exercises),
        )
        .route("/curriculum/exercises", get(super::handlers::list_exercises))
        .route("/curriculum/merge", post(super::handlers::merge))
        .route("/curriculum/tree", get(super::handlers::tree))
        .route(
            "/curriculum/embeddings/backfill-exercises",
            post(super::handlers::backfill_embeddings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Run the HTTP API server until shutdown
pub async fn run(ctx: AppContext, bind_addr: &str) -> Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid bind address '{bind_addr}': {e}")))?;

    let app = router(ctx);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("HTTP server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    // Ctrl+C or SIGTERM-equivalent; serve drains in-flight requests
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

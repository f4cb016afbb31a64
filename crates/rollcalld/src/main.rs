use anyhow::Result;
use rollcall_store::{FaceDb, QdrantIndex};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod handlers;
mod routes;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();

    // Fail fast when models are missing; the daemon is useless without them.
    let engine = engine::spawn_engine(&config.model_dir)?;

    let index = QdrantIndex::connect(&config.qdrant_url, config.qdrant_api_key.clone())?;
    let facedb = FaceDb::new(Arc::new(index));

    // A failed bootstrap leaves the daemon serving in a degraded state:
    // /health reports disconnected and store-touching endpoints return 500
    // until the service comes back.
    if let Err(e) = facedb.ensure_ready().await {
        tracing::warn!(error = %e, url = %config.qdrant_url, "collection bootstrap failed");
    } else {
        tracing::info!(url = %config.qdrant_url, "face collection ready");
    }

    let app = routes::router(routes::AppState { engine, facedb });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

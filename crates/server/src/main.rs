// crates/server/src/main.rs
//! Rowforge server binary.
//!
//! Starts the Axum HTTP server that fronts the job orchestration model.
//! Uploads land in the configured upload directory out of band; this process
//! owns job creation, the chunk worker pool, polling reads, cancellation,
//! and result download.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use rowforge_server::llm::LlmRowProcessor;
use rowforge_server::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rowforge=info,tower_http=warn")),
        )
        .init();

    let config = Config::from_env();
    if config.llm.api_key.is_empty() {
        tracing::warn!("ROWFORGE_LLM_API_KEY not set; rows will fail until it is configured");
    }
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;

    let processor = Arc::new(LlmRowProcessor::new(config.llm.clone()));
    let state = AppState::new(&config, processor);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, upload_dir = %config.upload_dir.display(), "rowforge listening");

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

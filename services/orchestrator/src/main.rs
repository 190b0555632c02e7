use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use orchestrator::{routes, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    std::fs::create_dir_all(&cfg.artifact_dir)
        .with_context(|| format!("Failed to create artifact dir {}", cfg.artifact_dir.display()))?;
    info!(
        original = %cfg.original_file.display(),
        workers = cfg.workers,
        timeout_secs = cfg.timeout.as_secs(),
        aggregation = cfg.aggregation.name(),
        "config loaded"
    );

    let app_state = Arc::new(AppState::new(cfg.clone()));
    let app = routes::router(app_state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("orchestrator listening on http://{addr}");
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

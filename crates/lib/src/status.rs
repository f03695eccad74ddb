//! Status server: health and session counters over HTTP (single read-only port).

use crate::config::StatusConfig;
use crate::stats::StatsReport;
use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
struct StatusState {
    mode: &'static str,
    port: u16,
    stats: Arc<dyn StatsReport>,
}

async fn health(State(state): State<StatusState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "mode": state.mode,
        "port": state.port,
    }))
}

async fn stats(State(state): State<StatusState>) -> Json<serde_json::Value> {
    Json(state.stats.report())
}

/// Serve `GET /` (health) and `GET /stats` (counters) until the process exits.
pub async fn run_status_server(
    config: StatusConfig,
    mode: &'static str,
    stats_source: Arc<dyn StatsReport>,
) -> Result<()> {
    let state = StatusState {
        mode,
        port: config.port,
        stats: stats_source,
    };
    let app = Router::new()
        .route("/", get(health))
        .route("/stats", get(stats))
        .with_state(state);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding status server to {}", addr))?;
    log::info!("status server listening on {}", addr);
    axum::serve(listener, app).await.context("status server")?;
    Ok(())
}

/// Spawn the status server in the background; failures are logged, not fatal
/// to the pipeline.
pub fn spawn_status_server(
    config: StatusConfig,
    mode: &'static str,
    stats_source: Arc<dyn StatsReport>,
) {
    tokio::spawn(async move {
        if let Err(e) = run_status_server(config, mode, stats_source).await {
            log::error!("status server failed: {}", e);
        }
    });
}

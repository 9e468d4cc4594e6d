//! Administrative HTTP endpoint exposing liveness and emit statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stats::{EmitterStats, StatsSnapshot};
use crate::Error;

pub fn router(stats: Arc<EmitterStats>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/stats", get(stats_snapshot))
        .with_state(stats)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn stats_snapshot(State(stats): State<Arc<EmitterStats>>) -> Json<StatsSnapshot> {
    Json(stats.snapshot())
}

/// Serves the admin endpoint until `token` fires.
pub async fn serve(
    listen: &str,
    stats: Arc<EmitterStats>,
    token: CancellationToken,
) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    debug!(addr = %listener.local_addr()?, "admin endpoint listening");
    axum::serve(listener, router(stats))
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;
    Ok(())
}

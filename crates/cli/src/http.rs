//! The ambient HTTP surface this process exposes on its own: `/healthz`
//! and `/metrics`. Everything else — sessions, contexts, actions — is a
//! protocol frontend's job, not this bin crate's (§1 "Out of scope").

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use headlessd_core::CoreApi;
use headlessd_metrics::MetricsHandle;
use headlessd_sessions::StoreStatus;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    metrics: MetricsHandle,
    core: Arc<CoreApi>,
}

/// Binds `addr` and serves `/healthz` + `/metrics` until the returned task
/// is aborted by the caller (see `main`'s shutdown path).
pub fn spawn(addr: String, metrics: MetricsHandle, core: Arc<CoreApi>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new()
            .route("/healthz", get(healthz))
            .route("/metrics", get(metrics_endpoint))
            .with_state(AppState { metrics, core });

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(%addr, %err, "failed to bind ambient HTTP listener, /healthz and /metrics are unavailable");
                return;
            },
        };
        info!(%addr, "ambient HTTP listener bound (/healthz, /metrics)");

        if let Err(err) = axum::serve(listener, app).await {
            warn!(%err, "ambient HTTP listener stopped unexpectedly");
        }
    })
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pool = state.core.pool_metrics().await;
    let store_status = state.core.store_health().await;

    Json(json!({
        "status": match store_status {
            Some(StoreStatus::Healthy) | None => "ok",
            Some(StoreStatus::Degraded) => "degraded",
            Some(StoreStatus::Unhealthy) => "unhealthy",
        },
        "pool": {
            "total_browsers": pool.total_browsers,
            "active": pool.active,
            "idle": pool.idle,
            "queued": pool.queued,
        },
        "store": store_status.map(|s| format!("{s:?}").to_lowercase()),
    }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.metrics.render()
}

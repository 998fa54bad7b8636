use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::registry::periods;
use crate::state::AppState;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

// Liveness: no I/O
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness: the database answers within the timeout.
///
/// A missing current period is reported but does not fail readiness.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match tokio::time::timeout(READY_TIMEOUT, periods::current_period(&state.db)).await {
        Ok(Ok(period)) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "current_period": period.name })),
        ),
        Ok(Err(crate::error::AppError::NoCurrentPeriod)) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "current_period": null })),
        ),
        Ok(Err(e)) => {
            tracing::warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not ready", "reason": "database" })))
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not ready", "reason": "timeout" }))),
    }
}

pub async fn api_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.get_snapshot().to_prometheus(),
    )
}

/// Build and runtime settings that matter when debugging a deployment.
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = &state.config;
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
        "storage_backend": cfg.storage.backend,
        "reviews": { "max_depth": cfg.reviews.max_depth },
        "catalog": { "default_limit": cfg.catalog.default_limit, "max_limit": cfg.catalog.max_limit },
    }))
}

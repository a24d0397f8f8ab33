//! Operational endpoints: health and Prometheus metrics.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::StudentsService;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub broker_connected: bool,
}

/// GET /health: process status and whether the broker session is up.
///
/// A lost broker session reports `"degraded"` but still answers 200; the
/// service keeps working and reconnects on the next operation.
pub async fn health(State(service): State<Arc<StudentsService>>) -> Json<HealthResponse> {
    let broker_connected = service.bus().is_connected();
    Json(HealthResponse {
        status: if broker_connected { "ok" } else { "degraded" },
        service: service.config().service_name.clone(),
        broker_connected,
    })
}

/// GET /metrics: Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {uri}"))
}

/// Creates the router serving the operational endpoints.
pub fn router(service: Arc<StudentsService>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health))
        .with_state(service)
        .merge(metrics_router)
        .fallback(not_found)
}

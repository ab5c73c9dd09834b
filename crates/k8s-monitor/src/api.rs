//! HTTP API for health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::health::{ComponentStatus, HealthRegistry};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry) -> Self {
        Self { health_registry }
    }
}

/// 200 while the provider is healthy or degraded, 503 once unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode Prometheus metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use monitor_lib::health::components;
    use monitor_lib::MonitorMetrics;
    use tower::ServiceExt;

    async fn get_path(state: Arc<AppState>, path: &str) -> (StatusCode, String) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn registry() -> HealthRegistry {
        let registry = HealthRegistry::new();
        registry.register(components::METRICS_PROVIDER).await;
        registry
    }

    #[tokio::test]
    async fn test_healthz_healthy() {
        let state = Arc::new(AppState::new(registry().await));

        let (status, body) = get_path(state, "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["components"][components::METRICS_PROVIDER].is_object());
    }

    #[tokio::test]
    async fn test_healthz_degraded_still_ok() {
        let health = registry().await;
        health
            .set_failing(components::METRICS_PROVIDER, "timeout", 1, 3)
            .await;

        let (status, body) = get_path(Arc::new(AppState::new(health)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("degraded"));
    }

    #[tokio::test]
    async fn test_healthz_unhealthy() {
        let health = registry().await;
        health
            .set_failing(components::METRICS_PROVIDER, "connection refused", 3, 3)
            .await;

        let (status, body) = get_path(Arc::new(AppState::new(health)), "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_readyz() {
        let health = registry().await;
        let state = Arc::new(AppState::new(health.clone()));

        let (status, _) = get_path(state.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        health.set_ready(true).await;
        let (status, body) = get_path(state, "/readyz").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["ready"], true);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = MonitorMetrics::new();
        metrics.observe_poll_latency(0.01);

        let (status, body) = get_path(Arc::new(AppState::new(registry().await)), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("k8s_monitor_polls_total"));
        assert!(body.contains("k8s_monitor_poll_latency_seconds"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get_path(Arc::new(AppState::new(registry().await)), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

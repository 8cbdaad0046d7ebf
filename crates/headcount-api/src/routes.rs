//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    health, start_mp4_tracking, start_tracking, stop_tracking, tracking_status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let config = &state.config;

    // Starts wait for the camera source to open. A start cut off by the
    // timeout leaves the camera failed and startable again.
    let start_routes = Router::new()
        .route("/track/start", post(start_tracking))
        .route("/track/mp4/start", post(start_mp4_tracking))
        .layer(TimeoutLayer::new(config.start_timeout));

    let track_routes = Router::new()
        .route("/track/stop/:camera_id", post(stop_tracking))
        .route("/track/status/:camera_id", get(tracking_status))
        // Recorded files
        .route("/track/mp4/stop/:camera_id", post(stop_tracking))
        .route("/track/mp4/status/:camera_id", get(tracking_status))
        .layer(TimeoutLayer::new(config.request_timeout));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(start_routes)
        .merge(track_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}

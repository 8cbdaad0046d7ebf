//! API middleware.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id of the current request, from the caller or generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// CORS for the dashboards that start and stop cameras. The request id is
/// exposed so a dashboard can quote it when reporting a failed start.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id])
        .max_age(Duration::from_secs(600))
}

/// Runs the request inside a span carrying its id, so worker logs written
/// while a start opens its source can be matched to the call.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(id.clone()));

    let span = info_span!("request", request_id = %id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();

    // Status polling and health checks are too chatty to log.
    let quiet = uri.path() == "/health"
        || uri.path() == "/healthz"
        || uri.path() == "/metrics"
        || uri.path().contains("/status/");
    if !quiet {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(origins: &[String]) -> Router {
        Router::new()
            .route("/track/status/:camera_id", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_id))
            .layer(cors_layer(origins))
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/track/status/cam-1")
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "GET")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_id_generated_when_missing() {
        let request = Request::builder()
            .uri("/track/status/cam-1")
            .body(Body::empty())
            .unwrap();
        let response = app(&["*".to_string()]).oneshot(request).await.unwrap();

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_cors_allows_configured_dashboard_only() {
        let origins = vec!["http://dashboard.local".to_string()];

        let allowed = app(&origins)
            .oneshot(preflight("http://dashboard.local"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()["access-control-allow-origin"],
            "http://dashboard.local"
        );

        let denied = app(&origins)
            .oneshot(preflight("http://elsewhere.local"))
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}

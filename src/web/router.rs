//! Web application router and middleware setup.

use crate::metrics::MetricRegistry;
use crate::web::handlers;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the axum application serving `registry`.
pub fn create_app(registry: Arc<MetricRegistry>) -> Router {
    Router::new()
        .route("/", get(handlers::default_index))
        .route("/metrics", get(handlers::metrics))
        .route("/api/health", get(handlers::health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::names;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Arc::new(MetricRegistry::with_default_gauges().unwrap());
        registry.set(names::CPU_USAGE, 50.0).unwrap();

        let (status, content_type, body) = get_body(create_app(registry), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
        assert!(body.contains("cpu_usage_percentage 50"));
        assert!(body.contains("# TYPE context_switches gauge"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let registry = Arc::new(MetricRegistry::new());
        let (status, _, body) = get_body(create_app(registry), "/api/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "procgauge");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let registry = Arc::new(MetricRegistry::new());
        let (status, _, _) = get_body(create_app(registry), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

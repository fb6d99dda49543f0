//! Route configuration for the stream server.

use std::sync::Arc;

use axum::routing::{Router, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::StreamConfig;
use crate::handlers::{get_status, health_check};
use crate::state::StreamState;
use crate::websocket::ws_upgrade;

/// Create the stream server router.
///
/// `/ws` is the viewer socket, `/api/*` the JSON endpoints. When a web
/// directory is configured, unmatched paths are served from it.
pub fn create_router(state: Arc<StreamState>) -> Router {
    let cors = build_cors_layer(state.config());
    let web_dir = state.config().web_dir.clone();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status));

    let mut router = Router::new()
        .route("/ws", get(ws_upgrade))
        .nest("/api", api_routes);

    if let Some(dir) = web_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &StreamConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tail_logs::LogStoreConfig;
    use tower::ServiceExt;

    fn make_test_state(config: StreamConfig) -> Arc<StreamState> {
        Arc::new(StreamState::new(config))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(make_test_state(StreamConfig::default()));

        let (status, json) = get_json(app, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let config = StreamConfig::default()
            .with_store(LogStoreConfig::default().with_max_index_values(1));
        let state = make_test_state(config);
        for id in ["a", "b"] {
            let raw = json!({"requestId": id});
            if let serde_json::Value::Object(map) = raw {
                state.coordinator().ingest(map);
            }
        }
        let app = create_router(state);

        let (status, json) = get_json(app, "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["logsStored"], 2);
        assert_eq!(json["clients"], 0);
        assert_eq!(json["blacklisted"], json!(["requestId"]));
        assert!(json["allocatedMemory"].is_u64());
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let app = create_router(make_test_state(StreamConfig::default()));

        let request = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route_without_web_dir() {
        let app = create_router(make_test_state(StreamConfig::default()));

        let request = Request::builder().uri("/index.html").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_web_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>tail</h1>").unwrap();
        let app = create_router(make_test_state(
            StreamConfig::default().with_web_dir(dir.path()),
        ));

        let request = Request::builder().uri("/index.html").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>tail</h1>");
    }

    #[tokio::test]
    async fn test_cors_with_configured_origin() {
        let app = create_router(make_test_state(
            StreamConfig::default().with_cors_origin("http://localhost:3000"),
        ));

        let request = Request::builder()
            .uri("/api/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }
}

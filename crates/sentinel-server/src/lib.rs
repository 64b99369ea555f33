//! C12: the HTTP/SSE entrypoint. Wires `AppState` into a router exposing
//! `POST /v1/stream` and `GET /health`, and serves it, split into a
//! constructor/`router()`/`run()` triple so the router can be exercised
//! directly in tests without binding a socket.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_addr
    }

    /// Assemble the router: both routes, permissive CORS (the gateway has
    /// no browser-facing origin restriction of its own to enforce) and
    /// HTTP tracing, bound to a clone of `state`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/stream", post(routes::stream_handler))
            .route("/health", get(routes::health_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.bind_address();
        self.run_on(addr).await
    }

    pub async fn run_on(self, addr: SocketAddr) -> std::io::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "sentinel server listening");
        axum::serve(listener, router).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sentinel_config::Config;
    use sentinel_provider::MockProviderClient;
    use sentinel_tools::demo::demo_registry;
    use tower::ServiceExt;

    fn test_server() -> Server {
        let state = AppState::new(Config::default(), Arc::new(MockProviderClient::new()), demo_registry());
        Server::new(state)
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok_and_model() {
        let app = test_server().router();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn stream_endpoint_returns_sse_content_type() {
        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"Find pizza; book at 7pm"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");
        assert!(response.headers().get("x-session-id").is_some());
    }

    #[tokio::test]
    async fn stream_endpoint_rejects_oversized_prompt() {
        let app = test_server().router();
        let huge = "x".repeat(64 * 1024 + 1);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({ "prompt": huge }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn stream_endpoint_rejects_malformed_json() {
        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/stream")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get("content-type").unwrap(), "application/json");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "bad_request");
        assert!(json["message"].as_str().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn stream_endpoint_drains_a_full_session_to_done() {
        use futures::StreamExt;

        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"Find pizza; book at 7pm"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_data_stream();
        let mut text = String::new();
        while let Some(chunk) = body.next().await {
            text.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if text.contains("event: done") {
                break;
            }
        }
        assert!(text.contains("event: result.begin"));
        assert!(text.contains("event: done"));
    }
}

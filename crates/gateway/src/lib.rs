//! HTTP API gateway for RepoLens.
//!
//! Exposes a health check and the v1 API for ingestion, search, analysis
//! and agent sessions. When `gateway.api_key` is configured every `/v1`
//! request must carry it in `X-API-Key`.
//!
//! Built on Axum.

pub mod api_v1;
pub mod engine;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::Engine;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use api_v1::{ApiV1State, SharedApiState};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Build the full router: `/health` plus the authenticated `/v1` API.
///
/// Layers applied:
/// - `X-API-Key` check on all /v1 routes when a key is configured
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState) -> Router {
    let v1 = api_v1::v1_router(state.clone())
        .layer(middleware::from_fn_with_state(state, api_key_middleware));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// In-flight ingestion jobs and agent sessions are cancelled on Ctrl-C.
pub async fn start(config: repolens_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    if config.gateway.api_key.is_none() {
        warn!("gateway.api_key is not set; the v1 API is unauthenticated");
    }

    let engine = Arc::new(Engine::from_config(config).await?);
    let state = Arc::new(ApiV1State::new(engine));
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Compare two secrets without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Authentication middleware for the /v1 API.
async fn api_key_middleware(
    State(state): State<SharedApiState>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    let Some(expected) = state.engine.config.gateway.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(req).await)
        }
        _ => {
            warn!(path = %req.uri().path(), "Unauthorized request to /v1 API: missing or invalid X-API-Key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::test_support::{FixedReplyProvider, WordCountEmbedder};
    use axum::body::Body;
    use axum::http::Request;
    use repolens_config::AppConfig;
    use repolens_index::InMemoryStore;
    use tower::ServiceExt;

    fn keyed_state(key: Option<&str>) -> SharedApiState {
        let mut config = AppConfig::default();
        config.gateway.api_key = key.map(String::from);
        let engine = Engine::assemble(
            config,
            Arc::new(FixedReplyProvider {
                reply: "ok".into(),
            }),
            Arc::new(InMemoryStore::new()),
            Arc::new(WordCountEmbedder),
        )
        .unwrap();
        Arc::new(ApiV1State::new(Arc::new(engine)))
    }

    fn search_request(key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/search")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
            .body(Body::from(r#"{"workspace_id":"demo","query":"cache"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_needs_no_key() {
        let app = build_router(keyed_state(Some("s3cret")));
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_rejects_missing_or_wrong_key() {
        let state = keyed_state(Some("s3cret"));

        let response = build_router(state.clone())
            .oneshot(search_request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = build_router(state)
            .oneshot(search_request(Some("s3cres")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn v1_accepts_matching_key() {
        let response = build_router(keyed_state(Some("s3cret")))
            .oneshot(search_request(Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_open_without_configured_key() {
        let response = build_router(keyed_state(None))
            .oneshot(search_request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn constant_time_eq_compares_whole_value() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"", b"a"));
    }
}

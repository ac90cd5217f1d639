//! errorcast HTTP API
//!
//! HTTP and WebSocket surface, built with Axum.
//!
//! # Endpoints
//!
//! ## Capture
//! - `POST /api/v1/errors` - Report an error (fanned out to subscribers)
//! - `GET /api/v1/errors/summary` - Error counts by type and severity
//!
//! ## Stats
//! - `GET /api/v1/stats` - Current streaming statistics
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /` and `GET /ws` - Real-time error stream
//!
//! # Example
//!
//! ```rust,ignore
//! use errorcast::api::{serve, AppState};
//! use errorcast::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let state = AppState::from_config(&config);
//!
//!     let stats_task = state.hub.clone().start_stats_broadcast();
//!     serve(state, &config.server).await?;
//!     stats_task.await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, routing::post, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/errors", post(routes::capture::capture_error))
        .route("/errors/summary", get(routes::capture::error_summary))
        .route("/stats", get(routes::stats::streaming_stats));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(websocket_handler))
        .route("/ws", get(websocket_handler))
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server and run until SIGINT/SIGTERM
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("errorcast listening on {}", addr);

    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `signal` resolves
///
/// The hub is shut down as soon as the signal fires so open WebSocket
/// sessions close and axum's graceful drain can finish.
pub async fn serve_on<F>(listener: TcpListener, state: AppState, signal: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub = Arc::clone(&state.hub);
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            hub.shutdown().await;
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("errorcast shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, AppState) {
        let state = AppState::default();
        let router = build_router(state.clone());
        (router, state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_error(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/errors")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["server_status"], "idle");
    }

    #[tokio::test]
    async fn test_capture_error() {
        let (app, state) = create_test_app();

        let response = app
            .oneshot(post_error(
                r#"{"errorType": "overflow", "message": "RenderFlex overflowed by 42 pixels", "severity": "error"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert!(json["id"].as_str().unwrap().starts_with("error_"));
        assert_eq!(json["urgency"], "critical");
        assert!(!json["autoAnalysis"].as_str().unwrap().is_empty());
        assert!(!json["suggested_actions"].as_array().unwrap().is_empty());
        assert_eq!(state.hub.stats().total_errors, 1);
    }

    #[tokio::test]
    async fn test_capture_missing_message() {
        let (app, state) = create_test_app();

        let response = app
            .oneshot(post_error(r#"{"errorType": "network"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_ERROR_REPORT");
        assert_eq!(state.hub.stats().total_errors, 0);
    }

    #[tokio::test]
    async fn test_capture_invalid_json() {
        let (app, _) = create_test_app();

        let response = app.oneshot(post_error("not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_capture_after_shutdown() {
        let (app, state) = create_test_app();
        state.hub.shutdown().await;

        let response = app
            .oneshot(post_error(r#"{"errorType": "ui", "message": "boom"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_summary_and_stats() {
        let (app, _) = create_test_app();

        for body in [
            r#"{"errorType": "network", "message": "timeout", "severity": "warning"}"#,
            r#"{"errorType": "network", "message": "refused", "severity": "error"}"#,
            r#"{"errorType": "ui", "message": "overflow", "severity": "error"}"#,
        ] {
            let response = app.clone().oneshot(post_error(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/errors/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let summary = body_json(response).await;
        assert_eq!(summary["totalErrors"], 3);
        assert_eq!(summary["byType"]["network"], 2);
        assert_eq!(summary["bySeverity"]["error"], 2);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats["totalErrors"], 3);
        assert_eq!(stats["connectedClients"], 0);
        assert_eq!(stats["serverStatus"], "idle");
    }
}

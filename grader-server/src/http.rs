//! Grader HTTP API
//!
//! Axum-based HTTP server exposing submission grading.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function, so the grading paths are testable without axum dispatch.
//!
//! Endpoints:
//! - POST    /submissions - grade one submission
//! - OPTIONS /submissions - CORS preflight
//! - GET     /health      - store size and record queue statistics
//! - GET     /version     - server version info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use grader_core::{ActivityStore, GraderConfig};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::pipeline::{self, SubmissionError};
use crate::subsystems::recorder::RecordQueue;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<ActivityStore>,
    pub recorder: RecordQueue,
    pub config: GraderConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route(
            "/submissions",
            post(submission_handler).options(submission_options_handler),
        )
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Activity Grading Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner submission - grades the body and returns (status_code, json_body).
pub fn submission_inner(
    state: &HttpState,
    content_type: Option<&str>,
    body: &[u8],
) -> (StatusCode, serde_json::Value) {
    match pipeline::grade_submission(&state.store, &state.recorder, content_type, body) {
        Ok(feedback) => (
            StatusCode::OK,
            serde_json::to_value(feedback).unwrap_or_else(|_| serde_json::json!({})),
        ),
        Err(e) => error_body(&e),
    }
}

/// Inner health - store size plus a snapshot of the record queue (pure, no IO).
pub fn health_inner(state: &HttpState) -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "activities": state.store.len(),
        "records": state.recorder.snapshot(),
    })
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "grader/1",
    })
}

fn error_body(e: &SubmissionError) -> (StatusCode, serde_json::Value) {
    let body = serde_json::to_value(ErrorResponse::new(e.to_string()))
        .unwrap_or_else(|_| serde_json::json!({"status": "error"}));
    (e.status_code(), body)
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn submission_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let (status, body) = submission_inner(&state, content_type, &body);

    let mut response = (status, Json(body)).into_response();
    if state.config.http.cors {
        apply_cors_headers(response.headers_mut(), &headers);
    }
    response
}

pub async fn submission_options_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Response {
    let mut response = StatusCode::OK.into_response();
    if state.config.http.cors {
        apply_cors_headers(response.headers_mut(), &headers);
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        );
    }
    response
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner(&state)))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Helpers
// ============================================================================

/// Echo the request origin back and allow the JSON content-type header.
pub fn apply_cors_headers(response: &mut HeaderMap, request: &HeaderMap) {
    if let Some(origin) = request.get(header::ORIGIN) {
        response.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    response.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

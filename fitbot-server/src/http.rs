//! FitBot HTTP REST API
//!
//! Axum-based HTTP server exposing the classifier and both caches. Runs
//! alongside the Unix socket IPC server on port 8787 (configurable).
//!
//! Each endpoint is a thin axum handler over an `*_inner` function that
//! builds the equivalent IPC request and runs it through the router, so both
//! transports share one code path.
//!
//! Endpoints:
//! - GET    /health         : health check with storage status
//! - GET    /version        : server version info
//! - POST   /classify       : fitness topic classification
//! - POST   /answers/lookup : answer cache read
//! - POST   /answers        : answer cache write
//! - POST   /sources/lookup : source cache read
//! - POST   /sources        : source cache write
//! - GET    /cache          : cache statistics
//! - DELETE /cache          : run maintenance (thresholds as query params)

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fitbot_core::ipc::{CleanupOptions, FitbotRequest, FitbotResponse, VersionTags};
use fitbot_core::models::SourceMetadata;
use fitbot_core::ttl::checked_days;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::state::ServiceState;
use crate::subsystems::maintenance::CleanupThresholds;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/classify", post(classify_handler))
        .route("/answers/lookup", post(answer_lookup_handler))
        .route("/answers", post(answer_store_handler))
        .route("/sources/lookup", post(source_lookup_handler))
        .route("/sources", post(source_store_handler))
        .route("/cache", get(cache_stats_handler).delete(cache_cleanup_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: ServiceState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("FitBot HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerLookupRequest {
    pub question: Option<String>,
    #[serde(flatten)]
    pub versions: VersionTags,
    #[serde(default)]
    pub require_fresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnswerStoreRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceMetadata>,
    #[serde(flatten)]
    pub versions: VersionTags,
    pub ttl_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SourceLookupRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourceStoreRequest {
    pub url: Option<String>,
    pub content: Option<String>,
    pub title: Option<String>,
    pub raw_html: Option<String>,
    pub ttl_days: Option<i64>,
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

/// Inner health check: returns (status_code, json_body).
pub async fn health_inner(state: &ServiceState) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(FitbotRequest::Health, state).await;
    match response_to_http(response) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
                obj.insert(
                    "socket".to_string(),
                    serde_json::json!(state.config.service.socket_path),
                );
            }
            (StatusCode::OK, data)
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e,
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "fitbot/1",
    })
}

pub async fn classify_inner(
    state: &ServiceState,
    req: ClassifyRequest,
) -> (StatusCode, serde_json::Value) {
    let Some(query) = req.query else {
        return bad_request("query field is required");
    };
    dispatch(state, FitbotRequest::Classify { query }).await
}

pub async fn answer_lookup_inner(
    state: &ServiceState,
    req: AnswerLookupRequest,
) -> (StatusCode, serde_json::Value) {
    let question = match req.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => return bad_request("question field is required"),
    };
    dispatch(
        state,
        FitbotRequest::AnswerGet {
            question,
            versions: req.versions,
            require_fresh: req.require_fresh,
        },
    )
    .await
}

pub async fn answer_store_inner(
    state: &ServiceState,
    req: AnswerStoreRequest,
) -> (StatusCode, serde_json::Value) {
    let question = match req.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => return bad_request("question field is required"),
    };
    let Some(answer) = req.answer else {
        return bad_request("answer field is required");
    };
    if let Some(Err(e)) = req.ttl_days.map(|d| checked_days("ttl_days", d)) {
        return bad_request(&e.to_string());
    }
    dispatch(
        state,
        FitbotRequest::AnswerPut {
            question,
            answer,
            sources: req.sources,
            versions: req.versions,
            ttl_days: req.ttl_days,
        },
    )
    .await
}

pub async fn source_lookup_inner(
    state: &ServiceState,
    req: SourceLookupRequest,
) -> (StatusCode, serde_json::Value) {
    let url = match req.url {
        Some(u) if !u.trim().is_empty() => u,
        _ => return bad_request("url field is required"),
    };
    dispatch(state, FitbotRequest::SourceGet { url }).await
}

pub async fn source_store_inner(
    state: &ServiceState,
    req: SourceStoreRequest,
) -> (StatusCode, serde_json::Value) {
    let url = match req.url {
        Some(u) if !u.trim().is_empty() => u,
        _ => return bad_request("url field is required"),
    };
    let Some(content) = req.content else {
        return bad_request("content field is required");
    };
    if let Some(Err(e)) = req.ttl_days.map(|d| checked_days("ttl_days", d)) {
        return bad_request(&e.to_string());
    }
    dispatch(
        state,
        FitbotRequest::SourcePut {
            url,
            content,
            title: req.title,
            raw_html: req.raw_html,
            ttl_days: req.ttl_days,
        },
    )
    .await
}

pub async fn cache_stats_inner(state: &ServiceState) -> (StatusCode, serde_json::Value) {
    dispatch(state, FitbotRequest::CacheStats).await
}

pub async fn cache_cleanup_inner(
    state: &ServiceState,
    options: CleanupOptions,
) -> (StatusCode, serde_json::Value) {
    if let Err(e) = CleanupThresholds::from(&state.config.maintenance).with_options(&options) {
        return bad_request(&e.to_string());
    }
    dispatch(state, FitbotRequest::CacheCleanup { options }).await
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<ServiceState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn classify_handler(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<ClassifyRequest>,
) -> impl IntoResponse {
    let (status, body) = classify_inner(&state, req).await;
    (status, Json(body))
}

pub async fn answer_lookup_handler(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<AnswerLookupRequest>,
) -> impl IntoResponse {
    let (status, body) = answer_lookup_inner(&state, req).await;
    (status, Json(body))
}

pub async fn answer_store_handler(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<AnswerStoreRequest>,
) -> impl IntoResponse {
    let (status, body) = answer_store_inner(&state, req).await;
    (status, Json(body))
}

pub async fn source_lookup_handler(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<SourceLookupRequest>,
) -> impl IntoResponse {
    let (status, body) = source_lookup_inner(&state, req).await;
    (status, Json(body))
}

pub async fn source_store_handler(
    State(state): State<Arc<ServiceState>>,
    Json(req): Json<SourceStoreRequest>,
) -> impl IntoResponse {
    let (status, body) = source_store_inner(&state, req).await;
    (status, Json(body))
}

pub async fn cache_stats_handler(State(state): State<Arc<ServiceState>>) -> impl IntoResponse {
    let (status, body) = cache_stats_inner(&state).await;
    (status, Json(body))
}

pub async fn cache_cleanup_handler(
    State(state): State<Arc<ServiceState>>,
    Query(options): Query<CleanupOptions>,
) -> impl IntoResponse {
    let (status, body) = cache_cleanup_inner(&state, options).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

async fn dispatch(state: &ServiceState, request: FitbotRequest) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(request, state).await;
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!(ErrorResponse::new(e)),
        ),
    }
}

fn bad_request(msg: &str) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        serde_json::json!(ErrorResponse::new(msg)),
    )
}

/// Convert an IPC `FitbotResponse` into an HTTP body value, or an error string.
pub fn response_to_http(response: FitbotResponse) -> std::result::Result<serde_json::Value, String> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err(response.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

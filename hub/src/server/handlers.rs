//! HTTP route handlers for the hub server.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::error::ApiError;
use crate::MetricHub;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<MetricHub>,
}

/// Handle POST /metrics: parse and buffer a text exposition push.
///
/// Returns 200 with an empty body on success, 400 on a parse error and
/// 406 when the push would overfill the configured limit.
pub async fn handle_receive(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state.hub.receive_text(&body)?;
    Ok(StatusCode::OK)
}

/// Handle GET /metrics: drain the buffer and render it for the
/// collector. A render timeout yields an empty 200 body.
pub async fn handle_scrape(State(state): State<AppState>) -> String {
    state.hub.scrape().await
}

#[derive(Debug, Deserialize)]
pub struct DebugParams {
    verbose: Option<String>,
}

/// Handle GET /debug: report the current state without draining.
pub async fn handle_debug(
    State(state): State<AppState>,
    Query(params): Query<DebugParams>,
) -> String {
    state.hub.debug_report(params.verbose.is_some()).await
}

/// Handle GET /internal: text exposition of the hub's own gauges.
pub async fn handle_internal(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .hub
        .metrics()
        .encode()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Handle GET /: liveness probe.
pub async fn handle_liveness() -> StatusCode {
    StatusCode::OK
}

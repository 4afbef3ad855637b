//! Response cache maintenance handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::api::server::AppState;

use super::error_response;

/// GET /cache/stats
pub async fn get_cache_stats(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.cache.stats() {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))),
        Err(e) => error_response("Failed to read cache stats", &e),
    }
}

/// DELETE /cache: drop every cached response.
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.cache.clear() {
        Ok(removed) => (StatusCode::OK, Json(json!({ "removed": removed }))),
        Err(e) => error_response("Failed to clear cache", &e),
    }
}

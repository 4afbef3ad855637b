//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

/// GET /health: basic liveness info.
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

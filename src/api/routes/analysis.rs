//! Analysis handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::server::AppState;

use super::{error_response, message, session_id};

const FAILURE_CONTEXT: &str = "Failed to process Gemini call";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /gemini-call: analyse the session's latest food submission for a
/// user.
pub async fn gemini_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AnalysisRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(user_id) = body.user_id.filter(|id| !id.is_empty()) else {
        return message(StatusCode::BAD_REQUEST, "User ID is missing");
    };
    let Some(analyzer) = state.analyzer.as_ref() else {
        return message(
            StatusCode::SERVICE_UNAVAILABLE,
            "Analysis service is not configured",
        );
    };

    let user = match state.users.load(&user_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return message(
                StatusCode::NOT_FOUND,
                format!("User details for {user_id} not found."),
            )
        }
        Err(e) => return error_response(FAILURE_CONTEXT, &e),
    };

    let session = session_id(&headers);
    let food = match state.food.load(&session) {
        Ok(Some(food)) => food,
        Ok(None) => {
            return message(
                StatusCode::NOT_FOUND,
                "No food details found. Save food details first.",
            )
        }
        Err(e) => return error_response(FAILURE_CONTEXT, &e),
    };

    match analyzer.analyze(&food, &user).await {
        Ok(verdict) => (StatusCode::OK, Json(verdict)),
        Err(e) => error_response(FAILURE_CONTEXT, &e),
    }
}

//! User profile handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::api::server::AppState;
use crate::error::CleanBitesError;
use crate::store::UserRecord;

use super::{error_response, message};

/// POST /save-details: store a profile under its embedded `userId`.
pub async fn save_details(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let record = match UserRecord::from_value(body) {
        Ok(r) => r,
        Err(e) => return error_response("Invalid data received", &e),
    };
    if record.user_id().is_none() {
        return message(
            StatusCode::BAD_REQUEST,
            "Invalid data received: Missing userId",
        );
    }
    match state.users.save(&record) {
        Ok(user_id) => (
            StatusCode::OK,
            Json(json!({
                "message": "Details saved successfully",
                "user_id": user_id,
            })),
        ),
        Err(e) => error_response("Failed to save details", &e),
    }
}

/// GET /get-user-details/{user_id}
pub async fn get_user_details(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.users.load(&user_id) {
        Ok(Some(record)) => (StatusCode::OK, Json(record.into_value())),
        Ok(None) => message(
            StatusCode::NOT_FOUND,
            "No user details found for this user ID.",
        ),
        Err(e) => error_response("Failed to load user details", &e),
    }
}

/// POST /update-user-details/{user_id}: replace the profile at `user_id`.
pub async fn update_user_details(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let record = match UserRecord::from_value(body) {
        Ok(r) => r,
        Err(e) => return error_response("Invalid data received", &e),
    };
    if record.user_id().is_none() {
        return message(
            StatusCode::BAD_REQUEST,
            "Invalid data received: Missing userId",
        );
    }
    match state.users.update(&user_id, &record) {
        Ok(()) => message(StatusCode::OK, "Details updated successfully"),
        Err(CleanBitesError::Mismatch { .. }) => message(
            StatusCode::BAD_REQUEST,
            "Invalid data received: userId mismatch",
        ),
        Err(e) => error_response("Failed to update details", &e),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::routes::test_util::{body_json, json_body};
    use crate::api::server::{build_router, test_support::temp_state};
    use crate::config::ServerConfig;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::json;
    use tower::util::ServiceExt;

    fn app() -> (tempfile::TempDir, Router) {
        let (tmp, state) = temp_state();
        (tmp, build_router(state, &ServerConfig::default()))
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(json_body(&body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<axum::body::Body> {
        Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips_profile() {
        let (_tmp, app) = app();
        let resp = app
            .clone()
            .oneshot(post(
                "/save-details",
                json!({"userId": "u1", "age": 30, "allergies": ["peanut"]}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "Details saved successfully");
        assert_eq!(body["user_id"], "u1");

        let resp = app.oneshot(get("/get-user-details/u1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["age"], 30);
        assert_eq!(body["allergies"][0], "peanut");
    }

    #[tokio::test]
    async fn test_save_without_user_id_is_400() {
        let (_tmp, app) = app();
        let resp = app
            .oneshot(post("/save-details", json!({"age": 30})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "Invalid data received: Missing userId");
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_404() {
        let (_tmp, app) = app();
        let resp = app.oneshot(get("/get-user-details/ghost")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "No user details found for this user ID.");
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let (_tmp, app) = app();
        app.clone()
            .oneshot(post("/save-details", json!({"userId": "u1", "age": 30, "diet": "vegan"})))
            .await
            .unwrap();
        let resp = app
            .clone()
            .oneshot(post(
                "/update-user-details/u1",
                json!({"userId": "u1", "age": 31}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await["message"],
            "Details updated successfully"
        );

        let body = body_json(app.oneshot(get("/get-user-details/u1")).await.unwrap()).await;
        assert_eq!(body["age"], 31);
        assert!(body.get("diet").is_none());
    }

    #[tokio::test]
    async fn test_update_with_mismatched_id_is_400_and_keeps_record() {
        let (_tmp, app) = app();
        app.clone()
            .oneshot(post("/save-details", json!({"userId": "u1", "age": 30})))
            .await
            .unwrap();
        let resp = app
            .clone()
            .oneshot(post(
                "/update-user-details/u1",
                json!({"userId": "u2", "age": 99}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["message"],
            "Invalid data received: userId mismatch"
        );

        let body = body_json(app.oneshot(get("/get-user-details/u1")).await.unwrap()).await;
        assert_eq!(body["age"], 30);
    }

    #[tokio::test]
    async fn test_provider_style_user_id_round_trips() {
        let (_tmp, app) = app();
        let resp = app
            .clone()
            .oneshot(post(
                "/save-details",
                json!({"userId": "auth0|64f1c2", "age": 30}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["user_id"], "auth0|64f1c2");

        let resp = app
            .clone()
            .oneshot(get("/get-user-details/auth0%7C64f1c2"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["age"], 30);

        let resp = app
            .clone()
            .oneshot(post(
                "/update-user-details/auth0%7C64f1c2",
                json!({"userId": "auth0|64f1c2", "age": 31}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(get("/get-user-details/google-oauth2%7Cnobody"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_without_user_id_is_missing_not_mismatch() {
        let (_tmp, app) = app();
        let resp = app
            .oneshot(post("/update-user-details/u1", json!({"age": 1})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["message"],
            "Invalid data received: Missing userId"
        );
    }

    #[tokio::test]
    async fn test_non_object_body_reports_validation_error() {
        let (_tmp, app) = app();
        for uri in ["/save-details", "/update-user-details/u1"] {
            let resp = app
                .clone()
                .oneshot(post(uri, json!(["not", "an", "object"])))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = body_json(resp).await;
            assert_eq!(body["message"], "Invalid data received", "{uri}");
            assert!(body["error"].as_str().unwrap().contains("an array"), "{uri}");
        }
    }
}

//! Food submission and label-image handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::api::server::AppState;
use crate::error::CleanBitesError;
use crate::providers::{strip_code_fence, TextExtractor};
use crate::store::FoodDetails;

use super::{error_response, message, session_id};

/// Form field carrying a label photo on `/save-food-details`.
const INFO_IMAGE_FIELD: &str = "infoImage";
/// Form field carrying the photo on `/extract-text-from-image`.
const IMAGE_FIELD: &str = "image";
/// MIME type assumed when an upload does not declare one.
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// An uploaded file pulled out of a multipart body.
struct Upload {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

async fn read_upload(field: Field<'_>) -> Result<Upload, Response> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let mime_type = field
        .content_type()
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| bad_multipart(&e.body_text()))?;
    Ok(Upload {
        file_name,
        mime_type,
        bytes: bytes.to_vec(),
    })
}

fn bad_multipart(detail: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": "Invalid form data", "error": detail })),
    )
        .into_response()
}

fn extractor_unavailable() -> Response {
    message(
        StatusCode::SERVICE_UNAVAILABLE,
        "Image extraction is not configured",
    )
    .into_response()
}

/// Run the extractor on `upload` and parse its answer as food details.
async fn extract_food_details(
    extractor: &dyn TextExtractor,
    upload: &Upload,
) -> crate::error::Result<FoodDetails> {
    let text = extractor
        .extract_text(&upload.bytes, &upload.mime_type)
        .await?;
    let value: Value = serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
        CleanBitesError::ResponseFormat(format!("label extraction is not valid JSON: {e}"))
    })?;
    FoodDetails::from_value(value)
}

/// POST /save-food-details: store the session's food submission and echo
/// it back.
///
/// Accepts JSON, a urlencoded form, or a multipart form. A multipart
/// `infoImage` part is read through the text extractor; otherwise
/// `productName` and `ingredients` are required.
pub async fn save_food_details(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let session = session_id(req.headers());
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let details = if content_type.starts_with("multipart/form-data") {
        match food_from_multipart(&state, req).await {
            Ok(details) => details,
            Err(resp) => return resp,
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = match Form::<HashMap<String, String>>::from_request(req, &()).await {
            Ok(form) => form,
            Err(rejection) => return rejection.into_response(),
        };
        let map: Map<String, Value> = fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        match submission_details(Value::Object(map)) {
            Ok(details) => details,
            Err(resp) => return resp,
        }
    } else {
        let Json(body) = match Json::<Value>::from_request(req, &()).await {
            Ok(json) => json,
            Err(rejection) => return rejection.into_response(),
        };
        match submission_details(body) {
            Ok(details) => details,
            Err(resp) => return resp,
        }
    };

    if let Err(e) = state.food.save(&session, &details) {
        return error_response("Failed to save food details", &e).into_response();
    }
    (StatusCode::OK, Json(details)).into_response()
}

/// Parse a text submission. Absent required fields get their own message;
/// any other problem is reported with its error.
fn submission_details(value: Value) -> Result<FoodDetails, Response> {
    if let Some(obj) = value.as_object() {
        if !(obj.contains_key("productName") && obj.contains_key("ingredients")) {
            return Err(message(
                StatusCode::BAD_REQUEST,
                "Invalid data received: Missing required fields",
            )
            .into_response());
        }
    }
    FoodDetails::from_submission(value)
        .map_err(|e| error_response("Invalid data received", &e).into_response())
}

async fn food_from_multipart(state: &AppState, req: Request) -> Result<FoodDetails, Response> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(IntoResponse::into_response)?;

    let mut fields = Map::new();
    let mut image = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_multipart(&e.body_text())),
        };
        let name = field.name().unwrap_or_default().to_string();
        if name == INFO_IMAGE_FIELD {
            image = Some(read_upload(field).await?);
        } else if !name.is_empty() {
            let text = field.text().await.map_err(|e| bad_multipart(&e.body_text()))?;
            fields.insert(name, Value::String(text));
        }
    }

    let Some(upload) = image else {
        return submission_details(Value::Object(fields));
    };
    if upload.file_name.is_empty() {
        return Err(message(StatusCode::BAD_REQUEST, "No selected image file").into_response());
    }
    let Some(extractor) = state.extractor.as_deref() else {
        return Err(extractor_unavailable());
    };

    info!(
        file = %upload.file_name,
        bytes = upload.bytes.len(),
        "Extracting food details from label image"
    );
    let mut details = extract_food_details(extractor, &upload)
        .await
        .map_err(|e| error_response("Failed to read label image", &e).into_response())?;
    if details.product_name.is_empty() {
        if let Some(Value::String(name)) = fields.get("productName") {
            details.product_name = name.clone();
        }
    }
    Ok(details)
}

/// POST /extract-text-from-image: return the raw text read from `image`.
pub async fn extract_text_from_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => {
                match read_upload(field).await {
                    Ok(u) => upload = Some(u),
                    Err(resp) => return resp,
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => return bad_multipart(&e.body_text()),
        }
    }

    let Some(upload) = upload else {
        return message(StatusCode::BAD_REQUEST, "No image file provided").into_response();
    };
    if upload.file_name.is_empty() {
        return message(StatusCode::BAD_REQUEST, "No selected image file").into_response();
    }
    let Some(extractor) = state.extractor.as_deref() else {
        return extractor_unavailable();
    };

    match extractor
        .extract_text(&upload.bytes, &upload.mime_type)
        .await
    {
        Ok(text) => (
            StatusCode::OK,
            Json(json!({ "extracted_text": text.trim() })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Label text extraction failed");
            error_response("Failed to extract text from image", &e).into_response()
        }
    }
}

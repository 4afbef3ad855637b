//! Route handlers and shared response helpers.

pub mod analysis;
pub mod cache;
pub mod food;
pub mod health;
pub mod users;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use crate::error::CleanBitesError;
use crate::store::DEFAULT_SESSION;

/// Request header naming the caller's food-search session.
pub const SESSION_HEADER: &str = "x-session-id";

/// HTTP status for a library error.
pub fn status_for(err: &CleanBitesError) -> StatusCode {
    match err {
        CleanBitesError::Validation(_) | CleanBitesError::Mismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        CleanBitesError::ResponseFormat(_) | CleanBitesError::Provider(_) => {
            StatusCode::BAD_GATEWAY
        }
        CleanBitesError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CleanBitesError::Decode(_) | CleanBitesError::Io(_) | CleanBitesError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `{"message": context, "error": err}` with the matching status.
pub(crate) fn error_response(context: &str, err: &CleanBitesError) -> (StatusCode, Json<Value>) {
    let status = status_for(err);
    if status.is_server_error() {
        error!(error = %err, "{context}");
    }
    (
        status,
        Json(json!({ "message": context, "error": err.to_string() })),
    )
}

/// `{"message": message}` with `status`.
pub(crate) fn message(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": message.into() })))
}

/// Session id from [`SESSION_HEADER`], or the shared default slot.
pub(crate) fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

#[cfg(test)]
pub(crate) mod test_util {
    use axum::body::Body;
    use axum::response::Response;
    use serde_json::Value;

    /// Collect a response body as JSON.
    pub async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn json_body(value: &Value) -> Body {
        Body::from(serde_json::to_vec(value).unwrap())
    }

    pub const BOUNDARY: &str = "cleanbites-test-boundary";

    /// A multipart part: `(name, filename, content type, bytes)`.
    pub type Part<'a> = (&'a str, Option<&'a str>, Option<&'a str>, &'a [u8]);

    /// Encode `parts` as a `multipart/form-data` body using [`BOUNDARY`].
    pub fn multipart_body(parts: &[Part<'_>]) -> Body {
        let mut out = Vec::new();
        for (name, filename, content_type, data) in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{name}\"");
            if let Some(f) = filename {
                disposition.push_str(&format!("; filename=\"{f}\""));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            if let Some(ct) = content_type {
                out.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(out)
    }

    pub fn multipart_content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }
}

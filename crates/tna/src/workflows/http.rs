//! Shared pieces of the HTTP adapters.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use super::directory::UserId;
use super::ErrorKind;

/// Header carrying the authenticated caller's user id. Authentication itself happens upstream.
pub const CALLER_HEADER: &str = "x-user-id";

pub(crate) fn caller_from(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::new)
        .ok_or_else(|| {
            let payload = json!({ "error": format!("missing {CALLER_HEADER} header") });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

pub(crate) fn error_response(kind: ErrorKind, message: String) -> Response {
    if kind == ErrorKind::ServerFault {
        error!(error = %message, "request failed");
    }
    let payload = json!({ "error": message });
    (kind.status_code(), Json(payload)).into_response()
}

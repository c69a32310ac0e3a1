//! HTTP handlers.

pub mod products;

use crate::error::{AppError, ErrorBody};
use crate::response::BaseResponse;
use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

pub async fn healthcheck() -> Json<BaseResponse> {
    Json(BaseResponse::default())
}

/// Fallback for unmatched routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::message("Not found")))
}

/// Error responses the framework builds itself (405 on a known path, for one) carry no JSON body.
/// Rewrap them in the error envelope, keeping status and headers such as `Allow`.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);
    let message = status.canonical_reason().unwrap_or("Error");
    (parts, Json(ErrorBody::message(message))).into_response()
}

/// Malformed JSON is a validation failure; a body over the size limit is 413.
pub(crate) fn json_rejection(e: JsonRejection) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge;
    }
    rejection("body", e.body_text())
}

/// Extractor rejections (malformed JSON, undecodable query strings) are validation failures.
pub(crate) fn rejection(source: &str, details: String) -> AppError {
    AppError::Validation(vec![format!("{}: {}", source, details)])
}

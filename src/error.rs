//! Typed errors and HTTP mapping.

use crate::sql::FilterError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const INTERNAL_ERROR_MESSAGE: &str =
    "You encountered an internal error. Report your HTTP request and value of `traceback` to developer.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable '{0}' is required but not set")]
    MissingVar(String),
    #[error("environment variable '{key}' is invalid: {details}")]
    Invalid { key: String, details: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("Validation Error")]
    Validation(Vec<String>),
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration: {0}")]
    Migration(String),
}

impl AppError {
    pub fn product_not_found() -> Self {
        AppError::NotFound("Product not found".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Filter(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_) | AppError::Db(_) | AppError::Migration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error envelope: `ok` is always false, at least one of `message`/`traceback` is set.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<Vec<String>>,
}

impl ErrorBody {
    pub fn message(message: impl Into<String>) -> Self {
        ErrorBody {
            ok: false,
            message: Some(message.into()),
            traceback: None,
        }
    }
}

/// The error and its sources, outermost first, with double quotes swapped for backticks.
fn traceback_lines(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        lines.push(e.to_string().replace('"', "`"));
        current = e.source();
    }
    lines
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Validation(problems) => ErrorBody {
                ok: false,
                message: Some(err.to_string()),
                traceback: Some(problems.clone()),
            },
            AppError::Config(_) | AppError::Db(_) | AppError::Migration(_) => ErrorBody {
                ok: false,
                message: Some(INTERNAL_ERROR_MESSAGE.to_string()),
                traceback: Some(traceback_lines(err)),
            },
            _ => ErrorBody::message(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::product_not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Filter(FilterError::ConflictingForms { field: "id".into() }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Validation(vec![]).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AppError::Db(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflicting_filter_message() {
        let body = ErrorBody::from(&AppError::Filter(FilterError::ConflictingForms {
            field: "price".into(),
        }));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ok": false, "message": "Same filter may not be provided in multiple forms"})
        );
    }

    #[test]
    fn validation_lists_fields() {
        let body = ErrorBody::from(&AppError::Validation(vec![
            "name: too short".into(),
            "price: must be greater than 0".into(),
        ]));
        assert_eq!(body.message.as_deref(), Some("Validation Error"));
        assert_eq!(body.traceback.map(|t| t.len()), Some(2));
    }

    #[test]
    fn internal_errors_carry_traceback() {
        let err = AppError::Migration("step \"0001\" failed".into());
        let body = ErrorBody::from(&err);
        assert_eq!(body.message.as_deref(), Some(INTERNAL_ERROR_MESSAGE));
        assert_eq!(body.traceback, Some(vec!["migration: step `0001` failed".to_string()]));
    }
}

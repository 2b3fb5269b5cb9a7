//! HTTP-facing error type

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::camera::CameraError;
use crate::settings::{SettingsError, ValidationError};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A settings field was out of range or unknown
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Request body was not a valid settings object
    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// Camera enumeration failed
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Validation(v) => AppError::Validation(v),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(v) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error_code": "VALIDATION_ERROR",
                    "field": v.field,
                    "message": v.message,
                }),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error_code": "BAD_REQUEST", "message": msg }),
            ),
            AppError::Camera(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error_code": "CAMERA_ERROR", "message": e.to_string() }),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error_code": "INTERNAL_ERROR", "message": msg }),
            ),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

//! HTTP error types for the hub server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::HubError;

/// Error wrapper for converting hub errors to HTTP responses.
pub struct ApiError(pub HubError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            HubError::Parse(_) => (StatusCode::BAD_REQUEST, "bad_data"),
            HubError::Overfill { .. } => (StatusCode::NOT_ACCEPTABLE, "overfill"),
        };

        let body = serde_json::json!({
            "status": "error",
            "errorType": error_type,
            "error": self.0.to_string()
        });

        (status, Json(body)).into_response()
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        ApiError(err)
    }
}

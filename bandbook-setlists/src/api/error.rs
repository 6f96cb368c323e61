//! Mapping of service errors onto HTTP responses
//!
//! Bodies are `{"error": message}`, plus `"field"` for validation errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::Error;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidOperation(_) => StatusCode::CONFLICT,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::ConsistencyViolation(_) | Error::Database(_) | Error::Common(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let body = match &self {
            Error::Validation { field, message } => json!({ "error": message, "field": field }),
            // Internal detail stays in the log
            Error::Database(_) | Error::Common(_) if status.is_server_error() => {
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

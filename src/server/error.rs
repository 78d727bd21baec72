//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::WireRodError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A process parameter was missing or not a number
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WireRodError> for ServerError {
    fn from(err: WireRodError) -> Self {
        match err {
            WireRodError::InvalidInput { field, reason } => {
                ServerError::InvalidInput { field, reason }
            }
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match &self {
            ServerError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": true, "message": message }),
            ),
            ServerError::InvalidInput { field, .. } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": true, "message": message, "field": field }),
            ),
            ServerError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "error": true, "message": message }),
            ),
            ServerError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": true, "message": "An internal error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let err: ServerError = WireRodError::invalid_input("casting_temp", "missing value").into();
        assert!(matches!(&err, ServerError::InvalidInput { field, .. } if field == "casting_temp"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err: ServerError = WireRodError::ModelNotFitted.into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

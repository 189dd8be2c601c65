//! Error types for the HTTP API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fanout::FanoutError;
use thiserror::Error;

/// Errors a handler can return. Every variant renders as
/// `{"success": false, "error": <message>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request failed validation.
    #[error(transparent)]
    Validation(#[from] FanoutError),

    /// A required body field is missing or malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The operation is not allowed in this environment.
    #[error("Operación no permitida en producción")]
    Forbidden,

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Anything unexpected. The detail is logged, never returned.
    #[error("Error interno del servidor")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("Rejected request body: {}", rejection.body_text());
        ApiError::BadRequest("Cuerpo de la solicitud inválido".to_string())
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

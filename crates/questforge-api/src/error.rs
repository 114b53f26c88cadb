//! QuestForge API — error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use questforge_engine::EngineError;
use serde::Serialize;

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `EngineError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            EngineError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            EngineError::SessionExists(_) => (StatusCode::CONFLICT, "session_exists"),
            EngineError::NotAMember { .. } => (StatusCode::FORBIDDEN, "not_a_member"),
            EngineError::InvalidDefinition(_) => (StatusCode::BAD_REQUEST, "invalid_definition"),
            EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            EngineError::WorkerGone(_) => (StatusCode::SERVICE_UNAVAILABLE, "worker_gone"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

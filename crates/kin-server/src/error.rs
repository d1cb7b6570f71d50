//! HTTP-facing error mapping for the API layer, grounded verbatim on
//! `beagle-server::error::ApiError` (minus the hypergraph-specific
//! conversion, which has no counterpart here).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kin_consciousness::ConsciousnessError;
use serde::Serialize;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::TooManyRequests(_) => "TooManyRequests",
            ApiError::Internal(_) => "InternalServerError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.label(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        ApiError::Internal(value.to_string())
    }
}

/// Maps the orchestrator's error taxonomy onto the HTTP one: `Busy` is the
/// overload case (spec.md §7, "return a busy error"), `NoUsableInput` is a
/// client error, `Storage` is an internal failure.
impl From<ConsciousnessError> for ApiError {
    fn from(value: ConsciousnessError) -> Self {
        match value {
            ConsciousnessError::Busy => ApiError::TooManyRequests(value.to_string()),
            ConsciousnessError::NoUsableInput => ApiError::BadRequest(value.to_string()),
            ConsciousnessError::Storage(_) => ApiError::Internal(value.to_string()),
        }
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Every failure a handler can surface. The kind string is part of the
/// API contract: clients dispatch on it, so one kind is never reported
/// as another.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidQueryConfig(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("access denied")]
    AccessDenied,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    ExecutionFailed(String),
    #[allow(dead_code)]
    #[error("{0}")]
    PersistenceFailed(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidQueryConfig(_) => "invalid_query_config",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::AccessDenied => "access_denied",
            ApiError::NotFound(_) => "not_found",
            ApiError::ExecutionFailed(_) => "execution_failed",
            ApiError::PersistenceFailed(_) => "persistence_failed",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidQueryConfig(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ExecutionFailed(_)
            | ApiError::PersistenceFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::DomainError;
use tracing::error;

use crate::dto::ErrorBody;

/// Everything a handler can fail with, mapped onto a status code.
#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    /// Missing, malformed or unknown bearer token
    Unauthorized,
    Forbidden(String),
    BadRequest(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Domain(DomainError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Domain(DomainError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            // Backend details stay in the log
            ApiError::Domain(DomainError::Storage(detail)) => {
                error!(%detail, "storage failure while handling request");
                "internal server error".to_owned()
            }
            ApiError::Domain(err) => err.to_string(),
            ApiError::Unauthorized => "missing or unknown bearer token".to_owned(),
            ApiError::Forbidden(msg) | ApiError::BadRequest(msg) => msg,
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tally_types::ErrorResponse;

use crate::engagement::EngagementError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg)),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    Some("An unexpected error occurred".to_string()),
                )
            }
        };

        let error_response = ErrorResponse {
            error: message.to_string(),
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::Validation(msg) => ApiError::BadRequest(msg),
            EngagementError::TopicNotFound(_) => ApiError::NotFound(err.to_string()),
            EngagementError::TopicInactive(_) => ApiError::Conflict(err.to_string()),
            EngagementError::Storage(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

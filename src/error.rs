use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::types::{ApiErrorCode, ApiErrorResponse};

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    NotFound(String),
    Db(sqlx::Error),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, ApiErrorCode::Validation, message)
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, ApiErrorCode::Unauthorized, message)
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ApiErrorCode::NotFound, message),
            ApiError::Db(err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorCode::Database,
                    "database error".to_string(),
                )
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorCode::Internal,
                message,
            ),
        };

        (status, Json(ApiErrorResponse { code, message })).into_response()
    }
}

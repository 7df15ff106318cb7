use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hearth_shared::store::StoreError;
use log::error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: String) -> Self {
        AppError::BadRequest(message)
    }

    pub fn unauthorized(message: String) -> Self {
        AppError::Unauthorized(message)
    }

    pub fn forbidden(message: String) -> Self {
        AppError::Forbidden(message)
    }

    pub fn not_found(message: String) -> Self {
        AppError::NotFound(message)
    }

    pub fn conflict(message: String) -> Self {
        AppError::Conflict(message)
    }

    pub fn internal_server_error(message: String) -> Self {
        AppError::Internal(message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message),
            AppError::Internal(detail) => {
                // Log the detail, never send it to the client.
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong.".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Resource not found.".to_string()),
            StoreError::Conflict(detail) => {
                error!("Storage conflict: {}", detail);
                AppError::Conflict("Resource already exists.".to_string())
            }
            StoreError::Internal(detail) => AppError::Internal(detail),
        }
    }
}

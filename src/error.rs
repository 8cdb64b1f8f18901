//! Error types for the school library server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to clients alongside the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchStudent = 4,
    NoSuchData = 5,
    BookNotAvailable = 6,
    Duplicate = 7,
    MaxBorrowsReached = 8,
    BadValue = 9,
    BadDuration = 10,
    AlreadyReturned = 11,
    RoomHasStudents = 12,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot delete: {0}")]
    ProtectedDelete(String),

    #[error("No student with admission number {0}")]
    UnknownStudent(String),

    #[error("Borrow duration must be a positive number of days (got {0})")]
    InvalidDuration(i64),

    #[error("Book {0} is not available for borrowing")]
    BookUnavailable(i32),

    #[error("Student already holds {held} of {limit} books allowed from shelf {shelf}")]
    ShelfLimitExceeded { shelf: String, held: i64, limit: i32 },

    #[error("Borrow {0} has already been returned")]
    AlreadyReturned(i32),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorCode::NotAuthorized,
            AppError::NotFound(_) => ErrorCode::NoSuchData,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::ProtectedDelete(_) => ErrorCode::RoomHasStudents,
            AppError::UnknownStudent(_) => ErrorCode::NoSuchStudent,
            AppError::InvalidDuration(_) => ErrorCode::BadDuration,
            AppError::BookUnavailable(_) => ErrorCode::BookNotAvailable,
            AppError::ShelfLimitExceeded { .. } => ErrorCode::MaxBorrowsReached,
            AppError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::UnknownStudent(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_)
            | AppError::ProtectedDelete(_)
            | AppError::BookUnavailable(_)
            | AppError::AlreadyReturned(_) => StatusCode::CONFLICT,
            AppError::ShelfLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::ProtectedDelete(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

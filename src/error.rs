//! Error types for Shelfkeeper server

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchRental = 6,
    BookNotAvailable = 7,
    Duplicate = 8,
    RentalNotActive = 9,
    NotOwner = 10,
    CannotDeleteAdmin = 11,
    BadValue = 18,
    InvalidCredential = 30,
    UnknownToken = 31,
    TokenRevoked = 32,
    TokenExpired = 33,
    WrongTokenType = 34,
    PrincipalGone = 35,
    InvalidLogin = 36,
    TransactionFailure = 40,
    TransactionTimeout = 41,
}

/// Error taxonomy exposed to callers that need to branch on the failure
/// kind rather than on the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredential,
    UnknownToken,
    Revoked,
    Expired,
    WrongType,
    PrincipalGone,
    Forbidden,
    NotFound,
    Conflict,
    Unavailable,
    TransactionFailure,
    Validation,
    Internal,
}

/// Bearer-token authentication failures, one per gate
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,

    #[error("unknown token")]
    UnknownToken,

    #[error("token has been revoked")]
    Revoked,

    #[error("token has expired")]
    Expired,

    #[error("wrong token type for this endpoint")]
    WrongType,

    #[error("token owner no longer exists")]
    PrincipalGone,

    #[error("invalid login or password")]
    InvalidLogin,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("User with id {0} not found")]
    UserNotFound(i32),

    #[error("Target user with id {0} not found")]
    TargetUserNotFound(i32),

    #[error("Book with id {0} not found")]
    BookNotFound(i32),

    #[error("Rental with id {0} not found")]
    RentalNotFound(i32),

    #[error("Book {0} has no copies available")]
    BookNotAvailable(i32),

    #[error("Rental {0} is not active")]
    RentalNotActive(i32),

    #[error("User {user_id} does not own book {book_id}")]
    NotOwner { book_id: i32, user_id: i32 },

    #[error("Administrator accounts cannot be deleted")]
    CannotDeleteAdmin,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction failure: {0}")]
    Transaction(String),

    #[error("Transaction exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication(auth) => match auth {
                AuthError::InvalidCredential | AuthError::InvalidLogin => {
                    ErrorKind::InvalidCredential
                }
                AuthError::UnknownToken => ErrorKind::UnknownToken,
                AuthError::Revoked => ErrorKind::Revoked,
                AuthError::Expired => ErrorKind::Expired,
                AuthError::WrongType => ErrorKind::WrongType,
                AuthError::PrincipalGone => ErrorKind::PrincipalGone,
            },
            AppError::Authorization(_) => ErrorKind::Forbidden,
            AppError::UserNotFound(_)
            | AppError::TargetUserNotFound(_)
            | AppError::BookNotFound(_)
            | AppError::RentalNotFound(_) => ErrorKind::NotFound,
            AppError::BookNotAvailable(_) => ErrorKind::Unavailable,
            AppError::RentalNotActive(_)
            | AppError::NotOwner { .. }
            | AppError::CannotDeleteAdmin
            | AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Database(_) | AppError::Transaction(_) | AppError::Timeout(_) => {
                ErrorKind::TransactionFailure
            }
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The authentication gate that failed, if this is an authentication error
    pub fn auth_error(&self) -> Option<AuthError> {
        match self {
            AppError::Authentication(auth) => Some(*auth),
            _ => None,
        }
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
        let (status, code, message) = match &self {
            AppError::Authentication(auth) => {
                let code = match auth {
                    AuthError::InvalidCredential => ErrorCode::InvalidCredential,
                    AuthError::UnknownToken => ErrorCode::UnknownToken,
                    AuthError::Revoked => ErrorCode::TokenRevoked,
                    AuthError::Expired => ErrorCode::TokenExpired,
                    AuthError::WrongType => ErrorCode::WrongTokenType,
                    AuthError::PrincipalGone => ErrorCode::PrincipalGone,
                    AuthError::InvalidLogin => ErrorCode::InvalidLogin,
                };
                (StatusCode::UNAUTHORIZED, code, self.to_string())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::UserNotFound(_) | AppError::TargetUserNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchUser, self.to_string())
            }
            AppError::BookNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, self.to_string())
            }
            AppError::RentalNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchRental, self.to_string())
            }
            AppError::BookNotAvailable(_) => {
                (StatusCode::CONFLICT, ErrorCode::BookNotAvailable, self.to_string())
            }
            AppError::RentalNotActive(_) => {
                (StatusCode::CONFLICT, ErrorCode::RentalNotActive, self.to_string())
            }
            AppError::NotOwner { .. } => {
                (StatusCode::CONFLICT, ErrorCode::NotOwner, self.to_string())
            }
            AppError::CannotDeleteAdmin => {
                (StatusCode::CONFLICT, ErrorCode::CannotDeleteAdmin, self.to_string())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Transaction(msg) => {
                tracing::error!("Transaction failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::TransactionFailure,
                    "Transaction failure".to_string(),
                )
            }
            AppError::Timeout(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::TransactionTimeout,
                self.to_string(),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
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

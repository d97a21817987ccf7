//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Constraint guarding one title per user
const LOAN_TITLE_CONSTRAINT: &str = "loans_user_id_title_key";

/// Constraint guarding one account per email
const USER_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Loan, transaction or user absent or not owned by the caller
    NotFound,
    /// Loan title collision within a user
    DuplicateTitle,
    /// Email already registered to another user
    DuplicateUser,
    /// Request failed validation; nothing was written
    InvalidInput,
    /// The atomic unit could not commit
    StorageFailure,
    /// Caller could not be authenticated or lacks a permission
    Unauthorized,
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("A loan titled \"{0}\" already exists")]
    DuplicateTitle(String),

    #[error("A user with email \"{0}\" already exists")]
    DuplicateUser(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidRequest(_) | AppError::MissingHeader(_) | AppError::Domain(_) => {
                ErrorKind::InvalidInput
            }
            AppError::InvalidApiKey | AppError::Forbidden(_) => ErrorKind::Unauthorized,
            AppError::UserNotFound(_)
            | AppError::LoanNotFound(_)
            | AppError::TransactionNotFound(_) => ErrorKind::NotFound,
            AppError::DuplicateTitle(_) => ErrorKind::DuplicateTitle,
            AppError::DuplicateUser(_) => ErrorKind::DuplicateUser,
            AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
                ErrorKind::StorageFailure
            }
        }
    }

    /// Translate a write failure, turning unique violations on the loan
    /// title or user email into their dedicated errors.
    pub fn from_write(err: sqlx::Error, attempted: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                match db_err.constraint() {
                    Some(LOAN_TITLE_CONSTRAINT) => {
                        return AppError::DuplicateTitle(attempted.to_string())
                    }
                    Some(USER_EMAIL_CONSTRAINT) => {
                        return AppError::DuplicateUser(attempted.to_string())
                    }
                    _ => {}
                }
            }
        }
        AppError::Database(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: ErrorKind,
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }
            AppError::Domain(domain_err) => {
                (StatusCode::BAD_REQUEST, "invalid_input", Some(domain_err.to_string()))
            }

            // 401 Unauthorized
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),

            // 403 Forbidden
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),

            // 404 Not Found
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
            }
            AppError::LoanNotFound(title) => {
                (StatusCode::NOT_FOUND, "loan_not_found", Some(title.clone()))
            }
            AppError::TransactionNotFound(id) => {
                (StatusCode::NOT_FOUND, "transaction_not_found", Some(id.clone()))
            }

            // 409 Conflict
            AppError::DuplicateTitle(title) => {
                (StatusCode::CONFLICT, "duplicate_title", Some(title.clone()))
            }
            AppError::DuplicateUser(email) => {
                (StatusCode::CONFLICT, "duplicate_user", Some(email.clone()))
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let message = match self.kind() {
            ErrorKind::StorageFailure => "The operation could not be completed".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            kind: self.kind(),
            error_code: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

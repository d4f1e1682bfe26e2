use std::error::Error;
use std::fmt::{Display, Formatter};

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;

use crate::web::models::ErrorResponse;

/// Error type shared by the store, services and handlers
#[derive(Debug, Clone, PartialEq)]
pub enum BlogError {
    /// Input failed schema or business validation
    Validation(String),
    /// Missing, malformed or expired credentials
    Unauthorized(String),
    /// Authenticated but not allowed to perform the action
    Forbidden(String),
    /// Requested document does not exist (or is not visible)
    NotFound(String),
    /// Uniqueness or referential constraint violated
    Conflict(String),
    /// Underlying document store failed
    Storage(String),
    /// Anything else that should never reach a client verbatim
    Internal(String),
}

impl BlogError {
    /// Stable machine-readable code sent in error envelopes
    pub fn error_code(&self) -> &'static str {
        match self {
            BlogError::Validation(_) => "VALIDATION_FAILED",
            BlogError::Unauthorized(_) => "UNAUTHORIZED",
            BlogError::Forbidden(_) => "FORBIDDEN",
            BlogError::NotFound(_) => "NOT_FOUND",
            BlogError::Conflict(_) => "CONFLICT",
            BlogError::Storage(_) => "STORAGE_ERROR",
            BlogError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn not_found(kind: &str, key: &str) -> Self {
        BlogError::NotFound(format!("{} not found: {}", kind, key))
    }
}

impl Display for BlogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlogError::Validation(msg) => write!(f, "Validation error: {}", msg),
            BlogError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            BlogError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            BlogError::NotFound(msg) => write!(f, "{}", msg),
            BlogError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            BlogError::Storage(msg) => write!(f, "Storage error: {}", msg),
            BlogError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl Error for BlogError {}

impl From<rusqlite::Error> for BlogError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                BlogError::Conflict(err.to_string())
            }
            _ => BlogError::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for BlogError {
    fn from(err: serde_json::Error) -> Self {
        BlogError::Internal(format!("document serialization failed: {}", err))
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::Validation(_) => StatusCode::BAD_REQUEST,
            BlogError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BlogError::Forbidden(_) => StatusCode::FORBIDDEN,
            BlogError::NotFound(_) => StatusCode::NOT_FOUND,
            BlogError::Conflict(_) => StatusCode::CONFLICT,
            BlogError::Storage(_) | BlogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Server-side failures are logged in full and reported generically
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(ErrorResponse {
            success: false,
            error: message,
            error_code: self.error_code().to_string(),
        })
    }
}

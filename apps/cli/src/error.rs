//! # CLI Error Type
//!
//! Every command returns `CliResult<T>`. Failures are printed to stderr as
//! `error[CODE]: message` (or as JSON with `--json`) and the process exits
//! with status 1.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Command function                                                       │
//! │       │                                                                 │
//! │       ├── DbError ─────── kind() ──────┐                                │
//! │       ├── CoreError ───────────────────┤                                │
//! │       ├── ConfigError ─────────────────┼──► ApiError { code, message }  │
//! │       └── io / serde_json ─────────────┘            │                   │
//! │                                                     ▼                   │
//! │                                  stderr + ExitCode::FAILURE             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage-engine failures are logged with full detail and reported to the
//! user with a generic message.

use partshop_core::CoreError;
use partshop_db::{DbError, ErrorKind};
use serde::Serialize;

use crate::config::ConfigError;

/// Error reported to the user.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Category not found: 42"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for scripts
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes, printed in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Duplicate name or invalid field value
    ConstraintViolation,

    NotFound,

    /// The Uncategorized category cannot be renamed or deleted
    Protected,

    /// Malformed import file or bad argument
    ValidationError,

    IoFailure,

    /// The store could not be brought up to date
    SchemaFailure,

    /// Nothing to export
    NoData,

    SharingUnavailable,

    /// Storage engine failure
    DatabaseError,

    ConfigError,

    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Protected => "PROTECTED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::IoFailure => "IO_FAILURE",
            ErrorCode::SchemaFailure => "SCHEMA_FAILURE",
            ErrorCode::NoData => "NO_DATA",
            ErrorCode::SharingUnavailable => "SHARING_UNAVAILABLE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let code = match err.kind() {
            ErrorKind::ConstraintViolation => ErrorCode::ConstraintViolation,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Protected => ErrorCode::Protected,
            ErrorKind::ValidationError => ErrorCode::ValidationError,
            ErrorKind::IoFailure => ErrorCode::IoFailure,
            ErrorKind::SchemaFailure => ErrorCode::SchemaFailure,
            ErrorKind::NoData => ErrorCode::NoData,
            ErrorKind::SharingUnavailable => ErrorCode::SharingUnavailable,
            ErrorKind::Storage => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", err);
                return ApiError::new(ErrorCode::DatabaseError, "Database operation failed");
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::new(ErrorCode::ConstraintViolation, e.to_string()),
            CoreError::Csv(e) => {
                tracing::error!("CSV codec failed: {}", e);
                ApiError::internal("CSV processing failed")
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::new(ErrorCode::IoFailure, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal(format!("Failed to render JSON: {}", err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error[{}]: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

pub type CliResult<T> = Result<T, ApiError>;

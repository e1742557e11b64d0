//! # Database Error Types
//!
//! Error types for storage operations, plus the caller-facing taxonomy
//! ([`ErrorKind`]) a UI uses to pick a message.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)   ValidationError   io::Error              │
//! │       │                            │                │                   │
//! │       ▼                            ▼                ▼                   │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── kind() → ErrorKind  (ConstraintViolation, NotFound, ...)     │
//! │       ▼                                                                 │
//! │  ApiError (in CLI) ← code + message                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors raised inside a transaction drop the `sqlx::Transaction`
//! uncommitted, which rolls it back before the error reaches the caller.

use serde::Serialize;
use thiserror::Error;

use partshop_core::{CoreError, ValidationError};

use crate::attachments::AttachmentError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a category whose name exists
    /// - Creating/renaming/moving an item onto an existing (category, name)
    #[error("Duplicate {field}: '{value}' already exists")]
    ConstraintViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Attempt to delete or rename the reserved Uncategorized category.
    #[error("Protected: {0}")]
    Protected(String),

    /// A field failed validation (empty name, negative quantity, ...).
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// An import file was rejected as a whole (bad header, no rows).
    #[error("Import rejected: {0}")]
    ImportRejected(ValidationError),

    /// Filesystem operation failed (attachment or import/export file).
    #[error("I/O failure: {0}")]
    Io(String),

    /// Migration failed. Fatal at startup.
    #[error("Schema migration failed: {0}")]
    SchemaFailure(String),

    /// Export requested with an empty inventory.
    #[error("No data to export")]
    NoData,

    /// The file-share collaborator could not take the export.
    #[error("Sharing is not available: {0}")]
    SharingUnavailable(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// The caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Uniqueness or required-field breach. Not retried.
    ConstraintViolation,
    NotFound,
    /// Mutation of the reserved Uncategorized row.
    Protected,
    /// Malformed import file or header.
    ValidationError,
    /// Attachment/import/export filesystem failure.
    IoFailure,
    /// Migration failure. Fatal.
    SchemaFailure,
    NoData,
    SharingUnavailable,
    /// Anything else coming out of the storage engine.
    Storage,
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a ConstraintViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::ConstraintViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Replaces the field/value of a unique violation with caller context.
    ///
    /// SQLite only reports the column list, so repositories attach the
    /// offending value themselves.
    pub fn with_duplicate(self, field: &str, value: &str) -> Self {
        match self {
            DbError::ConstraintViolation { .. } => DbError::duplicate(field, value),
            other => other,
        }
    }

    /// Classifies this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::ConstraintViolation { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::Validation(_) => ErrorKind::ConstraintViolation,
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::Protected(_) => ErrorKind::Protected,
            DbError::ImportRejected(_) => ErrorKind::ValidationError,
            DbError::Io(_) => ErrorKind::IoFailure,
            DbError::SchemaFailure(_) => ErrorKind::SchemaFailure,
            DbError::NoData => ErrorKind::NoData,
            DbError::SharingUnavailable(_) => ErrorKind::SharingUnavailable,
            DbError::ConnectionFailed(_)
            | DbError::QueryFailed(_)
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::Storage,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::ConstraintViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err.to_string())
    }
}

impl From<AttachmentError> for DbError {
    fn from(err: AttachmentError) -> Self {
        DbError::Io(err.to_string())
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => DbError::Validation(v),
            CoreError::Csv(msg) => DbError::Internal(msg),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

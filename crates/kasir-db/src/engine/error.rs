//! # Engine Error Type
//!
//! The single error every engine operation returns.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in an Engine Call                         │
//! │                                                                         │
//! │  create_transaction(actor, request)                                    │
//! │         │                                                               │
//! │         ├── pure rule violated ──► CoreError ──────┐                   │
//! │         │                                          │                   │
//! │         ├── SQLite failed ───────► DbError ────────┼──► EngineError    │
//! │         │                                          │        │          │
//! │         └── lock deadline hit ───► Busy{resource} ─┘        │          │
//! │                                                             ▼          │
//! │                                    sqlx Transaction dropped → ROLLBACK │
//! │                                                             │          │
//! │                                                             ▼          │
//! │                         ErrorBody { code: "INSUFFICIENT_STOCK", .. }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use kasir_core::{CoreError, ValidationError};

use crate::error::DbError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the request. Nothing was written.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed. The operation's transaction was rolled back.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A stock or document lock could not be taken within `lock_timeout`.
    ///
    /// ## When This Occurs
    /// - Many registers selling the same product at one shop at once
    /// - A long approval holding stock keys another request needs
    #[error("Resource busy: {resource}")]
    Busy { resource: String },
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(err))
    }
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InsufficientStock,
    InvalidState,
    PaymentExceedsBalance,
    AccessDenied,
    VoidWindowExpired,
    Conflict,
    Busy,
    DatabaseError,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(core) => match core {
                CoreError::Validation(_) => ErrorCode::ValidationError,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::NotFound { .. } => ErrorCode::NotFound,
                CoreError::InvalidStateTransition { .. } => ErrorCode::InvalidState,
                CoreError::PaymentExceedsBalance { .. } => ErrorCode::PaymentExceedsBalance,
                CoreError::AccessDenied { .. } => ErrorCode::AccessDenied,
                CoreError::VoidWindowExpired { .. } => ErrorCode::VoidWindowExpired,
            },
            EngineError::Db(db) => match db {
                DbError::NotFound { .. } => ErrorCode::NotFound,
                DbError::UniqueViolation { .. } => ErrorCode::Conflict,
                DbError::Invalid(_) | DbError::ForeignKeyViolation { .. } => {
                    ErrorCode::ValidationError
                }
                DbError::Busy(_) | DbError::PoolExhausted => ErrorCode::Busy,
                _ => ErrorCode::DatabaseError,
            },
            EngineError::Busy { .. } => ErrorCode::Busy,
        }
    }

    /// Whether the caller may retry the identical request.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Busy { .. } => true,
            EngineError::Db(db) => db.is_retryable(),
            EngineError::Core(_) => false,
        }
    }
}

/// What the HTTP layer serializes for a failed call.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock for INDOMIE: available 3, requested 5" }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        let message = match err {
            // Store details stay in the logs.
            EngineError::Db(db) if err.code() == ErrorCode::DatabaseError => {
                tracing::error!(error = %db, "Database operation failed");
                "Database operation failed".to_string()
            }
            _ => err.to_string(),
        };
        ErrorBody {
            code: err.code(),
            message,
            retryable: err.is_retryable(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule rejections                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kasir-db errors (separate crate)                                      │
//! │  ├── DbError          - Store failures, lock timeouts                  │
//! │  └── EngineError      - CoreError | DbError, with a stable ErrorCode   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → HTTP layer          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every rejection names what it rejected (product, invoice, document id)
//! so the caller can show the exact cause.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// All of these are detected before, or roll back, any durable write.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Not enough stock for a sale line or a transfer-out.
    ///
    /// ## When This Occurs
    /// - Sale pre-check finds fewer units than requested
    /// - A debit `adjust` would take the record below zero
    /// - Transfer source holds less than the transfer quantity
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 5 × INDOMIE at shop A
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "INDOMIE", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing written, caller sees "only 3 INDOMIE in stock"
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Referenced entity does not exist (or is soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Operation not allowed in the entity's current status.
    ///
    /// ## When This Occurs
    /// - Approving an opname that is already approved
    /// - Updating a purchase order that is no longer a draft
    /// - Paying a refunded or completed transaction
    #[error("{entity} {id} is {status}, cannot {operation}")]
    InvalidStateTransition {
        entity: String,
        id: String,
        status: String,
        operation: String,
    },

    /// A payment larger than what is still owed.
    #[error("Payment of {amount} exceeds remaining balance {remaining} on {invoice_number}")]
    PaymentExceedsBalance {
        invoice_number: String,
        amount: Money,
        remaining: Money,
    },

    /// The actor's visibility does not include the shop.
    #[error("Access denied to shop {shop_id}")]
    AccessDenied { shop_id: String },

    /// Void requested after the configured window by a non-admin role.
    #[error("Transaction {invoice_number} is older than {window_hours}h and cannot be voided by this role")]
    VoidWindowExpired {
        invoice_number: String,
        window_hours: i64,
    },
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidStateTransition error.
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        status: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidStateTransition {
            entity: entity.into(),
            id: id.into(),
            status: status.to_string(),
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs; never leaves partial effects.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The same key appears twice where it must be unique.
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

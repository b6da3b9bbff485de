//! # kasir-core: Pure Business Logic for Kasir
//!
//! This crate holds every rule of the transaction and stock consistency
//! engine that can be expressed without touching a database: price tier
//! selection, payment status derivation, totals, stock arithmetic and the
//! purchase-order / stock-opname lifecycles.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kasir Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (external, out of scope)                │   │
//! │  │       auth, routing, role gating, JSON envelopes                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Actor + typed requests                 │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                kasir-db (engines + repositories)                │   │
//! │  │   TransactionEngine  VoidEngine  PurchaseOrderEngine  Opname    │   │
//! │  │                     StockLedger  PricingResolver                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure calls                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   types   money   pricing   payment   totals   stock            │   │
//! │  │   access  invoice purchase  opname    validation                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Transaction, StockMovement, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Tiered / wholesale unit price selection
//! - [`payment`] - Payment status state machine
//! - [`totals`] - Line and transaction totals
//! - [`stock`] - Stock deltas and the non-negative rule
//! - [`access`] - Actor, roles, shop visibility
//! - [`invoice`] - Invoice / PO number formats
//! - [`purchase`] - Purchase order receiving rules
//! - [`opname`] - Stock count variance and approval selection
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::money::Money;
//! use kasir_core::payment::derive_status;
//! use kasir_core::types::PaymentStatus;
//!
//! let total = Money::from_cents(15_000);
//! let status = derive_status(total, Money::from_cents(5_000));
//! assert_eq!(status, PaymentStatus::Partial);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod invoice;
pub mod money;
pub mod opname;
pub mod payment;
pub mod pricing;
pub mod purchase;
pub mod stock;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{Actor, Role, Visibility};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single transaction line or purchase-order line.
///
/// ## Business Reason
/// Catches typing mistakes (1000 instead of 10) before stock moves.
pub const MAX_ITEM_QUANTITY: i64 = 99_999;

/// Maximum number of lines on one transaction, PO or opname.
pub const MAX_DOCUMENT_LINES: usize = 500;

/// Largest amount, in cents, accepted for any price, charge, payment or
/// computed total (10 000 000 000 000.00).
pub const MAX_MONEY_CENTS: i64 = 1_000_000_000_000_000;

/// Price category used when a caller asks for neither base nor wholesale
/// pricing explicitly.
pub const DEFAULT_PRICE_CATEGORY: i64 = 1;

/// Default loyalty conversion: one point per 10 000.00 spent, in cents.
pub const DEFAULT_POINTS_CONVERSION_CENTS: i64 = 1_000_000;

/// Default window (hours) in which non-admin roles may void a transaction.
pub const DEFAULT_VOID_WINDOW_HOURS: i64 = 24;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

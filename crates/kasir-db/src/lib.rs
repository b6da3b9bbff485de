//! # kasir-db: Persistence and Engines for Kasir
//!
//! Every durable write of the point-of-sale engine goes through this crate.
//! Rules live in `kasir-core`; this crate sequences them inside SQLite
//! transactions and serializes conflicting work with per-key locks.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kasir Data Flow                                │
//! │                                                                         │
//! │  Caller (HTTP handler, seed tool, tests)                                │
//! │       │  Actor + request                                                │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kasir-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌──────────────┐    │   │
//! │  │   │   Engines     │   │  Repositories  │   │  Migrations  │    │   │
//! │  │   │ (engine/*)    │──►│ (repository/*) │   │  (embedded)  │    │   │
//! │  │   │               │   │                │   │              │    │   │
//! │  │   │ Transaction   │   │ rows in/out,   │   │ 001_initial  │    │   │
//! │  │   │ Void, Ledger  │   │ visibility     │   │ _schema.sql  │    │   │
//! │  │   │ PO, Opname    │   │ filters        │   │              │    │   │
//! │  │   └──────┬────────┘   └────────────────┘   └──────────────┘    │   │
//! │  │          │ KeyedLocks + BEGIN IMMEDIATE                         │   │
//! │  └──────────┼──────────────────────────────────────────────────────┘   │
//! │             ▼                                                           │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML + environment configuration
//! - [`pool`] - Connection pool and engine accessors
//! - [`locks`] - Per-key async locks
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Row-level reads and writes
//! - [`engine`] - Transactional operations and their error surface
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_db::{Database, EngineConfig};
//!
//! let config = EngineConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?.with_policy(config.policy());
//!
//! let sale = db.transactions().create_transaction(&actor, request).await?;
//! let outcome = db.voids().void(&manager, &sale.transaction.invoice_number, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig, EnginePolicy};
pub use error::DbError;
pub use pool::{Database, DbConfig};

pub use engine::{
    EngineError, EngineResult, ErrorBody, ErrorCode, NewOpnameItem, NewPayment, NewPurchaseOrder,
    NewPurchaseOrderItem, NewStockOpname, NewTransaction, NewTransactionItem, PricingResolver,
    PurchaseOrderEngine, ReceiveLine, StockAdjustment, StockLedger, StockOpnameEngine,
    TransactionEngine, VoidEngine, VoidOutcome,
};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::product::{NewPriceRule, NewProduct, NewWholesalePrice, ProductRepository};
pub use repository::shop::ShopRepository;
pub use repository::stock::MovementFilter;
pub use repository::transaction::TransactionFilter;

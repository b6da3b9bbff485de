//! # Engines
//!
//! The write paths of Kasir. Every engine operation is one atomic unit.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Engine Operation                                 │
//! │                                                                         │
//! │  1. validate input          (kasir_core, no I/O)                       │
//! │  2. read what decides keys  (pool, short read)                         │
//! │  3. lock keys               (KeyedLocks, sorted, bounded wait)         │
//! │  4. BEGIN IMMEDIATE         (one connection)                           │
//! │  5. re-read + re-check      (state may have moved before step 3)       │
//! │  6. write rows              (stock + movement always paired)           │
//! │  7. COMMIT                  (drop on any error = ROLLBACK)             │
//! │  8. release locks           (LockSet dropped)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locks are always taken before a connection. With a single-connection
//! pool (tests, in-memory) the reverse order would let a lock holder wait
//! on a connection held by a lock waiter.
//!
//! ## Engines
//! - [`PricingResolver`] - unit price for (product, selector, shop, quantity)
//! - [`StockLedger`] - the only code that changes `product_stocks`
//! - [`TransactionEngine`] - sales, returns, adjustments and payments
//! - [`VoidEngine`] - compensating reversals
//! - [`PurchaseOrderEngine`] - purchase order lifecycle and receiving
//! - [`StockOpnameEngine`] - physical counts and their approval

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::config::EnginePolicy;
use crate::locks::{KeyedLocks, LockSet};

pub mod error;
pub mod ledger;
pub mod opname;
pub mod pricing;
pub mod purchase_order;
pub mod transaction;
pub mod void;

pub use error::{EngineError, EngineResult, ErrorBody, ErrorCode};
pub use ledger::{StockAdjustment, StockLedger};
pub use opname::{NewOpnameItem, NewStockOpname, StockOpnameEngine};
pub use pricing::PricingResolver;
pub use purchase_order::{NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrderEngine, ReceiveLine};
pub use transaction::{NewPayment, NewTransaction, NewTransactionItem, TransactionEngine};
pub use void::{VoidEngine, VoidOutcome};

/// What every engine needs: the pool, the shared lock registry and the
/// policy knobs.
#[derive(Debug, Clone)]
pub(crate) struct EngineContext {
    pub(crate) pool: SqlitePool,
    pub(crate) locks: KeyedLocks,
    pub(crate) policy: EnginePolicy,
}

impl EngineContext {
    pub(crate) fn new(pool: SqlitePool, locks: KeyedLocks, policy: EnginePolicy) -> Self {
        EngineContext {
            pool,
            locks,
            policy,
        }
    }

    /// Locks `keys` within the policy's lock timeout.
    pub(crate) async fn lock<I, K>(&self, keys: I) -> EngineResult<LockSet>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.locks.acquire(keys, self.policy.lock_timeout).await
    }

    /// Opens a write transaction that holds SQLite's write lock from the
    /// start, so no read inside it can go stale before the first write.
    pub(crate) async fn begin(&self) -> EngineResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

pub(crate) fn invoice_lock(invoice_number: &str) -> String {
    format!("invoice:{invoice_number}")
}

pub(crate) fn purchase_order_lock(id: &str) -> String {
    format!("po:{id}")
}

pub(crate) fn opname_lock(id: &str) -> String {
    format!("opname:{id}")
}

//! # Repository Module
//!
//! Row-level database access for Kasir.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways Into a Table                                │
//! │                                                                         │
//! │  Caller / tests                      Engines (one write transaction)   │
//! │       │                                    │                            │
//! │       │  db.products().get_by_sku(..)      │  fetch_product(&mut *tx,..)│
//! │       ▼                                    ▼                            │
//! │  ProductRepository (owns SqlitePool)   pub(crate) row helpers taking   │
//! │  ├── insert / get / list               any sqlx Executor               │
//! │  └── price rules                       (&SqlitePool or &mut conn)      │
//! │       │                                    │                            │
//! │       └──────────────► SQLite ◄────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row helpers never open a transaction themselves; atomicity is the
//! caller's job.
//!
//! ## Available Repositories
//!
//! - [`ShopRepository`](shop::ShopRepository) - Shops
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and points
//! - [`ProductRepository`](product::ProductRepository) - Products, price rules, wholesale prices
//! - `stock`, `transaction`, `purchase_order`, `opname`, `sequence` - row helpers
//!   behind the engines

use sqlx::{QueryBuilder, Sqlite};

use kasir_core::Visibility;

pub mod customer;
pub mod opname;
pub mod product;
pub mod purchase_order;
pub mod sequence;
pub mod shop;
pub mod stock;
pub mod transaction;

/// Restricts a query to the shops an actor can see.
///
/// Appends ` AND {column} IN (..)` for a restricted visibility. Returns
/// `false` when the visibility is an empty set, in which case the caller
/// should return no rows without querying.
pub(crate) fn push_visibility(
    builder: &mut QueryBuilder<'_, Sqlite>,
    column: &str,
    visibility: &Visibility,
) -> bool {
    let Some(shop_ids) = visibility.shop_ids() else {
        return true;
    };
    if shop_ids.is_empty() {
        return false;
    }

    builder.push(" AND ").push(column).push(" IN (");
    let mut separated = builder.separated(", ");
    for shop_id in shop_ids {
        separated.push_bind(shop_id.clone());
    }
    separated.push_unseparated(")");
    true
}

//! # Stock Arithmetic
//!
//! Pure rules behind every stock mutation. The ledger in `kasir-db` reads
//! the current level under a lock, asks this module for the new level, and
//! writes the level and its movement together.
//!
//! ```text
//!  current ──► apply_delta(current, delta, type) ──► new level
//!                     │
//!                     └── new < 0 and type ∈ {sale, transfer}
//!                             → InsufficientStock (nothing written)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{MovementType, TransactionType};

/// Identity of one stock row.
///
/// Field order gives the lock order: ascending by `(shop_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub shop_id: String,
    pub product_id: String,
}

impl StockKey {
    pub fn new(product_id: impl Into<String>, shop_id: impl Into<String>) -> Self {
        StockKey {
            shop_id: shop_id.into(),
            product_id: product_id.into(),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stock:{}:{}", self.shop_id, self.product_id)
    }
}

/// Applies `delta` to `current`, enforcing the non-negative rule for debit
/// types that require it.
pub fn apply_delta(
    product_id: &str,
    sku: &str,
    current: i64,
    delta: i64,
    movement_type: MovementType,
) -> CoreResult<i64> {
    let next = current + delta;
    if next < 0 && movement_type.requires_non_negative() {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            available: current,
            requested: -delta,
        });
    }
    Ok(next)
}

/// Pre-check used before any write: is `requested` available?
pub fn ensure_available(product_id: &str, sku: &str, available: i64, requested: i64) -> CoreResult<()> {
    if available < requested {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

/// Signed stock effect of a transaction line.
///
/// Sales remove stock, returns add it back, adjustments go the way the
/// line's `is_stock_addition` flag says (decrease when unset).
pub fn signed_quantity(transaction_type: TransactionType, quantity: i64, is_stock_addition: bool) -> i64 {
    match transaction_type {
        TransactionType::Sale => -quantity,
        TransactionType::Return => quantity,
        TransactionType::Adjustment if is_stock_addition => quantity,
        TransactionType::Adjustment => -quantity,
    }
}

/// Stock effect a void applies to undo `transaction_type`'s line.
pub fn void_quantity(transaction_type: TransactionType, quantity: i64) -> i64 {
    -signed_quantity(transaction_type, quantity, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_cannot_go_negative() {
        assert_eq!(apply_delta("p", "SKU", 8, -5, MovementType::Sale).unwrap(), 3);
        let err = apply_delta("p", "SKU", 3, -5, MovementType::Sale).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 3, requested: 5, .. }
        ));
    }

    #[test]
    fn test_transfer_out_cannot_go_negative() {
        assert!(apply_delta("p", "SKU", 2, -3, MovementType::Transfer).is_err());
    }

    #[test]
    fn test_void_and_adjustment_are_not_blocked() {
        assert_eq!(apply_delta("p", "SKU", 2, -3, MovementType::Void).unwrap(), -1);
        assert_eq!(apply_delta("p", "SKU", 0, -1, MovementType::Adjustment).unwrap(), -1);
    }

    #[test]
    fn test_signed_quantities() {
        assert_eq!(signed_quantity(TransactionType::Sale, 4, false), -4);
        assert_eq!(signed_quantity(TransactionType::Return, 4, false), 4);
        assert_eq!(signed_quantity(TransactionType::Adjustment, 4, true), 4);
        assert_eq!(signed_quantity(TransactionType::Adjustment, 4, false), -4);
        assert_eq!(void_quantity(TransactionType::Sale, 4), 4);
        assert_eq!(void_quantity(TransactionType::Return, 4), -4);
    }

    #[test]
    fn test_stock_keys_order_by_shop_then_product() {
        let mut keys = vec![
            StockKey::new("p-2", "shop-b"),
            StockKey::new("p-1", "shop-b"),
            StockKey::new("p-9", "shop-a"),
        ];
        keys.sort();
        assert_eq!(keys[0], StockKey::new("p-9", "shop-a"));
        assert_eq!(keys[1], StockKey::new("p-1", "shop-b"));
    }
}

//! # Purchase Order Rules
//!
//! ```text
//! receive([(item, new_received)]):
//!     0 <= new_received <= item.quantity        else ValidationError
//!     additional = new_received - item.received_quantity
//!     additional <= 0  → line skipped
//!     additional  > 0  → stock +additional (tracked products),
//!                        purchase_price := unit_price
//!
//! status after receive (over ALL lines of the order):
//!     every line complete       → received
//!     any line received > 0     → partial
//!     otherwise                 → unchanged
//! ```

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PurchaseOrderItem, PurchaseOrderStatus};
use crate::validation::{validate_money_non_negative, validate_quantity, within_money_limit};

/// Validates a new cumulative received quantity and returns how many units
/// arrive with it. Zero or negative means nothing new arrived.
pub fn receive_delta(item: &PurchaseOrderItem, new_received: i64) -> CoreResult<i64> {
    if new_received < 0 || new_received > item.quantity {
        return Err(ValidationError::OutOfRange {
            field: format!("received_quantity of item {}", item.id),
            min: 0,
            max: item.quantity,
        }
        .into());
    }
    Ok(new_received - item.received_quantity)
}

/// Status after a receipt, derived from every line of the order.
pub fn status_after_receipt(
    current: PurchaseOrderStatus,
    items: &[PurchaseOrderItem],
) -> PurchaseOrderStatus {
    if !items.is_empty() && items.iter().all(PurchaseOrderItem::is_complete) {
        PurchaseOrderStatus::Received
    } else if items.iter().any(|i| i.received_quantity > 0) {
        PurchaseOrderStatus::Partial
    } else {
        current
    }
}

/// Validates one order line and returns its subtotal.
pub fn line_subtotal(quantity: i64, unit_price: Money) -> CoreResult<Money> {
    validate_quantity(quantity)?;
    validate_money_non_negative("unit_price", unit_price)?;
    Ok(within_money_limit(
        "subtotal",
        unit_price.checked_multiply_quantity(quantity),
    )?)
}

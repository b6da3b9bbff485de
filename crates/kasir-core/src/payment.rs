//! # Payment Status
//!
//! The payment-status state machine of a transaction.
//!
//! ```text
//!   paid == 0                       → pending
//!   0 < paid < total                → partial
//!   paid settles total (±0.01)      → completed
//!
//!   add_payment:
//!     status refunded               → InvalidStateTransition
//!     amount > total - paid         → PaymentExceedsBalance
//!     status completed              → InvalidStateTransition
//! ```
//!
//! `refunded` is never derived from amounts; only a void sets it.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PaymentStatus;
use crate::validation::{validate_payment_amount, within_money_limit};

/// Derives the status from the total and the sum of payments.
pub fn derive_status(total: Money, paid: Money) -> PaymentStatus {
    if paid.settles(total) || paid > total {
        PaymentStatus::Completed
    } else if paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// What is still owed. Never negative.
pub fn remaining_balance(total: Money, paid: Money) -> Money {
    let remaining = total - paid;
    if remaining.is_negative() {
        Money::zero()
    } else {
        remaining
    }
}

/// Validates one more payment against a transaction's current state and
/// returns the status it leads to.
pub fn apply_payment(
    invoice_number: &str,
    status: PaymentStatus,
    total: Money,
    paid: Money,
    amount: Money,
) -> CoreResult<PaymentStatus> {
    validate_payment_amount(amount)?;

    if status == PaymentStatus::Refunded {
        return Err(CoreError::invalid_state(
            "Transaction",
            invoice_number,
            status,
            "accept payments",
        ));
    }

    let remaining = remaining_balance(total, paid);
    if amount > remaining {
        return Err(CoreError::PaymentExceedsBalance {
            invoice_number: invoice_number.to_string(),
            amount,
            remaining,
        });
    }

    if !status.accepts_payments() {
        return Err(CoreError::invalid_state(
            "Transaction",
            invoice_number,
            status,
            "accept payments",
        ));
    }

    Ok(derive_status(total, paid + amount))
}

/// Validates the payments supplied when a transaction is created and
/// returns their sum.
///
/// Every amount must be positive. Tendering more than the total at the
/// counter is allowed (the difference is change) and yields `completed`.
pub fn validate_initial_payments(amounts: &[Money]) -> CoreResult<Money> {
    for amount in amounts {
        validate_payment_amount(*amount)?;
    }
    Ok(within_money_limit("payments", Money::checked_sum(amounts))?)
}

// =============================================================================
// Unit Tests
// =============================================================================

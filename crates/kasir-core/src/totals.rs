//! # Transaction Totals
//!
//! ```text
//! line.subtotal = unit_price × quantity − line.discount
//! subtotal      = Σ line.subtotal
//! total         = subtotal − discount + tax + service_fee
//! ```
//!
//! Line-level tax is recorded on the line for reporting but is not added to
//! the subtotal; transaction-level `tax` is what reaches the total.

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_money_non_negative, validate_quantity, within_money_limit};

/// Priced amounts of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Money,
}

impl LineAmounts {
    /// `unit_price × quantity − discount`, rejecting a discount larger than
    /// the line.
    pub fn subtotal(&self) -> CoreResult<Money> {
        validate_quantity(self.quantity)?;
        validate_money_non_negative("unit_price", self.unit_price)?;
        validate_money_non_negative("discount_amount", self.discount)?;

        let gross = within_money_limit(
            "subtotal",
            self.unit_price.checked_multiply_quantity(self.quantity),
        )?;
        if self.discount > gross {
            return Err(ValidationError::OutOfRange {
                field: "discount_amount".to_string(),
                min: 0,
                max: gross.cents(),
            }
            .into());
        }
        Ok(gross - self.discount)
    }
}

/// Transaction-level adjustments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charges {
    pub discount: Money,
    pub tax: Money,
    pub service_fee: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub service_fee: Money,
    pub total: Money,
}

/// Computes the totals of a transaction from already computed line
/// subtotals.
pub fn compute_totals(line_subtotals: &[Money], charges: Charges) -> CoreResult<Totals> {
    validate_money_non_negative("discount_amount", charges.discount)?;
    validate_money_non_negative("tax_amount", charges.tax)?;
    validate_money_non_negative("service_fee", charges.service_fee)?;

    let subtotal = within_money_limit("subtotal", Money::checked_sum(line_subtotals))?;
    // Operands are within MAX_MONEY_CENTS, so the subtraction cannot overflow.
    let total = within_money_limit(
        "total_amount",
        Money::checked_sum(&[subtotal - charges.discount, charges.tax, charges.service_fee]),
    )?;
    if total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "total_amount".to_string(),
        }
        .into());
    }

    Ok(Totals {
        subtotal,
        discount: charges.discount,
        tax: charges.tax,
        service_fee: charges.service_fee,
        total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

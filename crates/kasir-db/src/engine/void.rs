//! # Void Engine
//!
//! Reverses a transaction without deleting anything.
//!
//! ## Void Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  void(actor, "TOK-20260314-0007", reason)                               │
//! │                                                                         │
//! │  original: sale, completed, 2 × KOPI                                    │
//! │       │                                                                 │
//! │       ├──► VOID-TOK-20260314-0007   return, completed, 2 × KOPI         │
//! │       │     └── payment "Reversal for TOK-20260314-0007"                │
//! │       ├──► stock +2 KOPI  (movement type void → reversal)               │
//! │       ├──► customer points − points awarded by the original             │
//! │       └──► original: refunded, notes "… | VOIDED by Budi on …"          │
//! │                                                                         │
//! │  Adjustments have no reversal type: they are only marked refunded.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Roles below admin may only void within the configured window after the
//! transaction date.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use kasir_core::access::{ensure_shop_access, ensure_void_window};
use kasir_core::invoice::reversal_invoice_number;
use kasir_core::stock::{void_quantity, StockKey};
use kasir_core::validation::validate_notes;
use kasir_core::{
    new_id, Actor, CoreError, MovementReference, MovementType, PaymentStatus, Transaction,
    TransactionDetail, TransactionItem, TransactionPayment,
};

use crate::engine::error::EngineResult;
use crate::engine::ledger::{apply_adjustment, StockAdjustment};
use crate::engine::{invoice_lock, EngineContext};
use crate::repository::customer::add_points;
use crate::repository::product::fetch_product;
use crate::repository::transaction::{
    fetch_by_invoice, fetch_items, insert_item, insert_payment, insert_transaction, load_detail,
    mark_refunded,
};

/// Result of a void.
#[derive(Debug, Clone, Serialize)]
pub struct VoidOutcome {
    /// The voided transaction, now `refunded`.
    pub original: TransactionDetail,
    /// The compensating transaction; `None` for adjustments.
    pub reversal: Option<TransactionDetail>,
}

#[derive(Debug, Clone)]
pub struct VoidEngine {
    ctx: EngineContext,
}

impl VoidEngine {
    pub(crate) fn new(ctx: EngineContext) -> Self {
        VoidEngine { ctx }
    }

    /// Voids `invoice_number`.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown invoice
    /// - `AccessDenied` when the actor cannot see the shop
    /// - `InvalidState` for a refunded transaction or a reversal
    /// - `VoidWindowExpired` for an old transaction and a non-admin role
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn void(
        &self,
        actor: &Actor,
        invoice_number: &str,
        reason: Option<&str>,
    ) -> EngineResult<VoidOutcome> {
        validate_notes(reason)?;

        // The stock keys depend on the items, so read them before locking.
        let (shop_id, items) = {
            let mut conn = self.ctx.pool.acquire().await?;
            let original = fetch_by_invoice(&mut *conn, invoice_number)
                .await?
                .ok_or_else(|| CoreError::not_found("Transaction", invoice_number))?;
            let items = fetch_items(&mut *conn, &original.id).await?;
            (original.shop_id, items)
        };
        ensure_shop_access(actor, &shop_id)?;

        let keys = std::iter::once(invoice_lock(invoice_number)).chain(
            items
                .iter()
                .map(|item| StockKey::new(&item.product_id, &shop_id).to_string()),
        );
        let _locks = self.ctx.lock(keys).await?;
        let mut tx = self.ctx.begin().await?;

        // Re-read under the lock: a concurrent void may have won.
        let original = fetch_by_invoice(&mut *tx, invoice_number)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", invoice_number))?;
        if original.reversal_of.is_some() {
            return Err(CoreError::invalid_state("Transaction", invoice_number, "a reversal", "be voided").into());
        }
        if original.payment_status == PaymentStatus::Refunded {
            return Err(CoreError::invalid_state(
                "Transaction",
                invoice_number,
                original.payment_status,
                "be voided",
            )
            .into());
        }

        let now = Utc::now();
        ensure_void_window(
            actor,
            invoice_number,
            original.transaction_date,
            now,
            self.ctx.policy.void_window_hours,
        )?;

        let items = fetch_items(&mut *tx, &original.id).await?;

        let reversal = match original.transaction_type.reversal() {
            Some(reversal_type) => {
                let reversal = Transaction {
                    id: new_id(),
                    invoice_number: reversal_invoice_number(invoice_number),
                    transaction_type: reversal_type,
                    user_id: actor.user_id.clone(),
                    payment_status: PaymentStatus::Completed,
                    transaction_date: now,
                    notes: Some(format!("Reversal of {invoice_number}")),
                    loyalty_points: 0,
                    reversal_of: Some(original.id.clone()),
                    created_at: now,
                    updated_at: now,
                    ..original.clone()
                };
                insert_transaction(&mut tx, &reversal).await?;

                for item in &items {
                    insert_item(
                        &mut tx,
                        &TransactionItem {
                            id: new_id(),
                            transaction_id: reversal.id.clone(),
                            ..item.clone()
                        },
                    )
                    .await?;
                }

                // Payment rows must be positive; a zero total has nothing to return.
                if reversal.total_amount.is_positive() {
                    insert_payment(
                        &mut tx,
                        &TransactionPayment {
                            id: new_id(),
                            transaction_id: reversal.id.clone(),
                            payment_method_id: original.payment_method_id.clone(),
                            amount: reversal.total_amount,
                            reference: Some(format!("Reversal for {invoice_number}")),
                            payment_date: now,
                        },
                    )
                    .await?;
                }

                for item in &items {
                    let tracked = fetch_product(&mut *tx, &item.product_id)
                        .await?
                        .is_some_and(|p| p.uses_stock);
                    if !tracked {
                        continue;
                    }
                    let adjustment = StockAdjustment {
                        product_id: item.product_id.clone(),
                        shop_id: original.shop_id.clone(),
                        quantity: void_quantity(original.transaction_type, item.quantity),
                        movement_type: MovementType::Void,
                        reference: MovementReference::Transaction {
                            id: reversal.id.clone(),
                        },
                        user_id: actor.user_id.clone(),
                        notes: Some(format!("void: {}", reversal.invoice_number)),
                    };
                    apply_adjustment(&mut tx, &adjustment, None).await?;
                }

                Some(reversal)
            }
            None => {
                warn!(invoice_number, "Adjustment voided without stock reversal");
                None
            }
        };

        if let (Some(customer_id), true) = (&original.customer_id, original.loyalty_points > 0) {
            add_points(&mut tx, customer_id, -original.loyalty_points).await?;
        }

        let notes = void_note(original.notes.as_deref(), &actor.name, now, reason);
        mark_refunded(&mut tx, &original.id, &notes, now).await?;

        let original = Transaction {
            payment_status: PaymentStatus::Refunded,
            notes: Some(notes),
            updated_at: now,
            ..original
        };
        let original = load_detail(&mut tx, original).await?;
        let reversal = match reversal {
            Some(reversal) => Some(load_detail(&mut tx, reversal).await?),
            None => None,
        };
        tx.commit().await?;

        info!(
            invoice_number,
            reversal = reversal.as_ref().map(|r| r.transaction.invoice_number.as_str()),
            "Transaction voided"
        );
        Ok(VoidOutcome { original, reversal })
    }
}

/// Appends the audit entry to the original's notes.
fn void_note(existing: Option<&str>, actor_name: &str, at: DateTime<Utc>, reason: Option<&str>) -> String {
    let mut entry = format!("VOIDED by {actor_name} on {}", at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        entry.push_str(&format!(". Reason: {}", reason.trim()));
    }
    match existing {
        Some(notes) if !notes.trim().is_empty() => format!("{notes} | {entry}"),
        _ => entry,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use kasir_core::{Money, TransactionType, Visibility};

    use crate::engine::error::ErrorCode;
    use crate::engine::transaction::{NewPayment, NewTransaction, NewTransactionItem};
    use crate::repository::stock::MovementFilter;
    use crate::testing::{fixture, product, stock_up, Fixture};

    async fn sell(fx: &Fixture, actor: &Actor, product_id: &str, quantity: i64, customer: Option<String>) -> TransactionDetail {
        fx.db
            .transactions()
            .create_transaction(
                actor,
                NewTransaction {
                    shop_id: fx.shop_a.id.clone(),
                    transaction_type: TransactionType::Sale,
                    customer_id: customer,
                    payment_method_id: "cash".into(),
                    items: vec![NewTransactionItem {
                        product_id: product_id.to_string(),
                        quantity,
                        unit_price: None,
                        price: None,
                        discount_amount: Money::zero(),
                        tax_amount: Money::zero(),
                        is_stock_addition: false,
                    }],
                    payments: vec![NewPayment {
                        payment_method_id: "cash".into(),
                        amount: Money::from_cents(100_000_000),
                        reference: None,
                    }],
                    discount_amount: Money::zero(),
                    tax_amount: Money::zero(),
                    service_fee: Money::zero(),
                    notes: Some("counter 2".into()),
                },
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_void_note_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        assert_eq!(
            void_note(None, "Budi", at, None),
            "VOIDED by Budi on 2026-03-14 09:30:00"
        );
        assert_eq!(
            void_note(Some("counter 2"), "Budi", at, Some("wrong item")),
            "counter 2 | VOIDED by Budi on 2026-03-14 09:30:00. Reason: wrong item"
        );
    }

    #[tokio::test]
    async fn test_void_restores_stock_and_records_reversal() {
        let fx = fixture().await;
        let p = product(&fx.db, "KOPI-1", 5_000, true).await;
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 10).await;
        let sale = sell(&fx, &fx.cashier, &p.id, 2, None).await;
        let invoice = sale.transaction.invoice_number.clone();
        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 8);

        let outcome = fx.db.voids().void(&fx.cashier, &invoice, Some("wrong item")).await.unwrap();

        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 10);
        assert_eq!(outcome.original.transaction.payment_status, PaymentStatus::Refunded);
        let notes = outcome.original.transaction.notes.clone().unwrap();
        assert!(notes.starts_with("counter 2 | VOIDED by Sari on "));
        assert!(notes.ends_with("Reason: wrong item"));

        let reversal = outcome.reversal.unwrap();
        assert_eq!(reversal.transaction.invoice_number, format!("VOID-{invoice}"));
        assert_eq!(reversal.transaction.transaction_type, TransactionType::Return);
        assert_eq!(reversal.transaction.payment_status, PaymentStatus::Completed);
        assert_eq!(reversal.transaction.reversal_of.as_deref(), Some(sale.transaction.id.as_str()));
        assert_eq!(reversal.items.len(), 1);
        assert_eq!(reversal.payments.len(), 1);
        assert_eq!(reversal.payments[0].amount.cents(), 10_000);
        assert_eq!(
            reversal.payments[0].reference.as_deref(),
            Some(format!("Reversal for {invoice}").as_str())
        );

        let voids = fx
            .db
            .ledger()
            .movements(
                &Visibility::All,
                &MovementFilter {
                    movement_type: Some(MovementType::Void),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(voids.len(), 1);
        assert_eq!(voids[0].quantity, 2);
        assert_eq!(
            voids[0].reference,
            MovementReference::Transaction {
                id: reversal.transaction.id.clone()
            }
        );
        assert_eq!(
            fx.db.ledger().movement_total(&p.id, &fx.shop_a.id).await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_double_void_and_reversal_void_rejected() {
        let fx = fixture().await;
        let p = product(&fx.db, "TEH-1", 400, true).await;
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 5).await;
        let sale = sell(&fx, &fx.owner, &p.id, 1, None).await;
        let invoice = sale.transaction.invoice_number.clone();

        let voids = fx.db.voids();
        voids.void(&fx.owner, &invoice, None).await.unwrap();

        let again = voids.void(&fx.owner, &invoice, None).await.unwrap_err();
        assert_eq!(again.code(), ErrorCode::InvalidState);
        let reversal = voids
            .void(&fx.owner, &format!("VOID-{invoice}"), None)
            .await
            .unwrap_err();
        assert_eq!(reversal.code(), ErrorCode::InvalidState);

        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_void_window_applies_below_admin() {
        let fx = fixture().await;
        let p = product(&fx.db, "GULA-1", 1_500, false).await;
        let sale = sell(&fx, &fx.cashier, &p.id, 1, None).await;
        let invoice = sale.transaction.invoice_number.clone();

        sqlx::query("UPDATE transactions SET transaction_date = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::hours(25))
            .bind(&sale.transaction.id)
            .execute(fx.db.pool())
            .await
            .unwrap();

        let err = fx.db.voids().void(&fx.cashier, &invoice, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::VoidWindowExpired);

        let outcome = fx.db.voids().void(&fx.owner, &invoice, None).await.unwrap();
        assert!(outcome.reversal.is_some());
    }

    #[tokio::test]
    async fn test_void_takes_back_points() {
        let fx = fixture().await;
        let customer = fx.db.customers().insert("Ani").await.unwrap();
        let p = product(&fx.db, "TV-32", 3_000_000, false).await;
        let sale = sell(&fx, &fx.owner, &p.id, 1, Some(customer.id.clone())).await;
        assert_eq!(sale.transaction.loyalty_points, 3);

        fx.db
            .voids()
            .void(&fx.owner, &sale.transaction.invoice_number, None)
            .await
            .unwrap();
        let stored = fx.db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(stored.loyalty_points, 0);
    }

    #[tokio::test]
    async fn test_adjustment_void_only_marks_refunded() {
        let fx = fixture().await;
        let p = product(&fx.db, "RAK-1", 20_000, true).await;
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 5).await;

        let adjustment = fx
            .db
            .transactions()
            .create_transaction(
                &fx.owner,
                NewTransaction {
                    shop_id: fx.shop_a.id.clone(),
                    transaction_type: TransactionType::Adjustment,
                    customer_id: None,
                    payment_method_id: "none".into(),
                    items: vec![NewTransactionItem {
                        product_id: p.id.clone(),
                        quantity: 2,
                        unit_price: Some(Money::zero()),
                        price: None,
                        discount_amount: Money::zero(),
                        tax_amount: Money::zero(),
                        is_stock_addition: false,
                    }],
                    payments: Vec::new(),
                    discount_amount: Money::zero(),
                    tax_amount: Money::zero(),
                    service_fee: Money::zero(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 3);

        let outcome = fx
            .db
            .voids()
            .void(&fx.owner, &adjustment.transaction.invoice_number, None)
            .await
            .unwrap();
        assert!(outcome.reversal.is_none());
        assert_eq!(outcome.original.transaction.payment_status, PaymentStatus::Refunded);
        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_void_of_return_may_take_stock_negative() {
        let fx = fixture().await;
        let p = product(&fx.db, "BOLA-1", 45_000, true).await;
        let returned = fx
            .db
            .transactions()
            .create_transaction(
                &fx.owner,
                NewTransaction {
                    shop_id: fx.shop_a.id.clone(),
                    transaction_type: TransactionType::Return,
                    customer_id: None,
                    payment_method_id: "cash".into(),
                    items: vec![NewTransactionItem {
                        product_id: p.id.clone(),
                        quantity: 2,
                        unit_price: None,
                        price: None,
                        discount_amount: Money::zero(),
                        tax_amount: Money::zero(),
                        is_stock_addition: false,
                    }],
                    payments: Vec::new(),
                    discount_amount: Money::zero(),
                    tax_amount: Money::zero(),
                    service_fee: Money::zero(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        sell(&fx, &fx.owner, &p.id, 2, None).await;
        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 0);

        let outcome = fx
            .db
            .voids()
            .void(&fx.owner, &returned.transaction.invoice_number, None)
            .await
            .unwrap();
        assert_eq!(
            outcome.reversal.unwrap().transaction.transaction_type,
            TransactionType::Sale
        );
        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_deleted_product_keeps_stock_history() {
        let fx = fixture().await;
        let p = product(&fx.db, "SIRUP-1", 2_000, true).await;
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 10).await;
        let sale = sell(&fx, &fx.cashier, &p.id, 4, None).await;

        fx.db.products().soft_delete(&p.id).await.unwrap();

        let record = fx.db.ledger().get_record(&p.id, &fx.shop_a.id).await.unwrap().unwrap();
        assert_eq!(record.stock, 6);
        let history = MovementFilter {
            product_id: Some(p.id.clone()),
            ..MovementFilter::default()
        };
        let before = fx.db.ledger().movements(&Visibility::All, &history).await.unwrap();
        assert_eq!(before.len(), 2);

        fx.db
            .voids()
            .void(&fx.owner, &sale.transaction.invoice_number, Some("product withdrawn"))
            .await
            .unwrap();

        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 10);
        let after = fx.db.ledger().movements(&Visibility::All, &history).await.unwrap();
        assert_eq!(after.len(), 3);
        assert_eq!(after[2].movement_type, MovementType::Void);
        assert_eq!(after[2].quantity, 4);
    }

    #[tokio::test]
    async fn test_foreign_shop_and_unknown_invoice() {
        let fx = fixture().await;
        let p = product(&fx.db, "PENA-1", 250, false).await;
        let sale = sell(&fx, &fx.owner, &p.id, 1, None).await;

        let outsider = Actor::new(
            "u-b",
            "Joko",
            kasir_core::Role::Manager,
            Visibility::shops([fx.shop_b.id.clone()]),
        );
        let denied = fx
            .db
            .voids()
            .void(&outsider, &sale.transaction.invoice_number, None)
            .await
            .unwrap_err();
        assert_eq!(denied.code(), ErrorCode::AccessDenied);

        let missing = fx.db.voids().void(&fx.owner, "NOPE-1", None).await.unwrap_err();
        assert_eq!(missing.code(), ErrorCode::NotFound);
    }
}

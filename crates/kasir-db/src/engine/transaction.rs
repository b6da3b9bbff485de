//! # Transaction Engine
//!
//! Sales, returns and stock adjustments, and the payments made against them.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_transaction(actor, request)                                    │
//! │                                                                         │
//! │  validate request ── actor can access shop? lines? money ≥ 0?          │
//! │       │                                                                 │
//! │  lock stock:{shop}:{product} for every line's product                  │
//! │       │                                                                 │
//! │  BEGIN IMMEDIATE ──────────────────────────────────────────────────┐   │
//! │  │ price each line (given price, else PricingResolver)              │   │
//! │  │ sale? Σqty per tracked product ≤ stock, else InsufficientStock   │   │
//! │  │ totals, invoice number (shop code + day counter)                 │   │
//! │  │ INSERT transaction, items (cost snapshot), payments              │   │
//! │  │ ledger: one movement per tracked line                            │   │
//! │  │ completed sale with customer → loyalty points                    │   │
//! │  └─ COMMIT ─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Status
//! `pending → partial → completed` (or straight to `completed`), judged on
//! Σ payments within one cent. `refunded` is set only by a void.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use kasir_core::access::ensure_shop_access;
use kasir_core::invoice::{business_date, invoice_number, invoice_scope, shop_code};
use kasir_core::payment::{apply_payment, derive_status, validate_initial_payments};
use kasir_core::pricing::PriceSelector;
use kasir_core::stock::{ensure_available, signed_quantity, StockKey};
use kasir_core::totals::{compute_totals, Charges, LineAmounts};
use kasir_core::validation::{
    validate_line_count, validate_money_non_negative, validate_notes, validate_quantity,
    validate_required,
};
use kasir_core::{
    new_id, Actor, CoreError, Money, MovementReference, PaymentStatus, Product, Transaction,
    TransactionDetail, TransactionItem, TransactionPayment, TransactionType, ValidationError,
    Visibility,
};

use crate::engine::error::EngineResult;
use crate::engine::ledger::{apply_adjustment, StockAdjustment};
use crate::engine::pricing::resolve_in;
use crate::engine::{invoice_lock, EngineContext};
use crate::repository::customer::{add_points, fetch_customer};
use crate::repository::product::fetch_product;
use crate::repository::sequence::next_value;
use crate::repository::shop::fetch_shop;
use crate::repository::stock::fetch_record;
use crate::repository::transaction::{
    fetch_by_invoice, fetch_list, insert_item, insert_payment, insert_transaction, load_detail,
    total_paid, update_payment_status, TransactionFilter,
};

// =============================================================================
// Requests
// =============================================================================

/// A transaction to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub shop_id: String,
    pub transaction_type: TransactionType,
    pub customer_id: Option<String>,
    pub payment_method_id: String,
    pub items: Vec<NewTransactionItem>,
    #[serde(default)]
    pub payments: Vec<NewPayment>,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub service_fee: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransactionItem {
    pub product_id: String,
    pub quantity: i64,
    /// Overrides price resolution when set.
    pub unit_price: Option<Money>,
    /// Price list for resolution; the default category when unset.
    pub price: Option<PriceSelector>,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    /// Adjustment lines only: add stock instead of removing it.
    #[serde(default)]
    pub is_stock_addition: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub payment_method_id: String,
    pub amount: Money,
    pub reference: Option<String>,
}

impl NewTransaction {
    fn validate(&self) -> EngineResult<()> {
        validate_required("shop_id", &self.shop_id)?;
        validate_required("payment_method_id", &self.payment_method_id)?;
        validate_line_count("items", self.items.len())?;
        validate_notes(self.notes.as_deref())?;
        validate_money_non_negative("discount_amount", self.discount_amount)?;
        validate_money_non_negative("tax_amount", self.tax_amount)?;
        validate_money_non_negative("service_fee", self.service_fee)?;

        for item in &self.items {
            validate_required("product_id", &item.product_id)?;
            validate_quantity(item.quantity)?;
            validate_money_non_negative("discount_amount", item.discount_amount)?;
            validate_money_non_negative("tax_amount", item.tax_amount)?;
            if let Some(price) = item.unit_price {
                validate_money_non_negative("unit_price", price)?;
            }
        }
        for payment in &self.payments {
            validate_required("payment_method_id", &payment.payment_method_id)?;
        }
        Ok(())
    }

    fn stock_keys(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| StockKey::new(&item.product_id, &self.shop_id).to_string())
            .collect()
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct TransactionEngine {
    ctx: EngineContext,
}

/// A line after pricing, before it is written.
struct PricedLine<'a> {
    request: &'a NewTransactionItem,
    product: Product,
    unit_price: Money,
    price_category_id: Option<i64>,
    subtotal: Money,
}

impl TransactionEngine {
    pub(crate) fn new(ctx: EngineContext) -> Self {
        TransactionEngine { ctx }
    }

    /// Records a sale, return or adjustment with its items, payments, stock
    /// movements and loyalty points, all or nothing.
    ///
    /// ## Errors
    /// - `AccessDenied` when the actor cannot see the shop
    /// - `NotFound` for an unknown shop, customer or product
    /// - `InsufficientStock` when a sale needs more than the shop holds
    /// - `ValidationError` for malformed input or an unsellable product
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, shop_id = %request.shop_id))]
    pub async fn create_transaction(
        &self,
        actor: &Actor,
        request: NewTransaction,
    ) -> EngineResult<TransactionDetail> {
        ensure_shop_access(actor, &request.shop_id)?;
        request.validate()?;
        let tendered: Vec<Money> = request.payments.iter().map(|p| p.amount).collect();
        let paid = validate_initial_payments(&tendered)?;

        let _locks = self.ctx.lock(request.stock_keys()).await?;
        let mut tx = self.ctx.begin().await?;

        let shop = fetch_shop(&mut *tx, &request.shop_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Shop", &request.shop_id))?;
        if !shop.is_active {
            return Err(CoreError::invalid_state("Shop", &shop.id, "inactive", "record transactions").into());
        }
        if let Some(customer_id) = &request.customer_id {
            if fetch_customer(&mut *tx, customer_id).await?.is_none() {
                return Err(CoreError::not_found("Customer", customer_id).into());
            }
        }

        // Pricing
        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = fetch_product(&mut *tx, &item.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Product", &item.product_id))?;
            if request.transaction_type == TransactionType::Sale && !product.is_sellable() {
                return Err(ValidationError::invalid(
                    "product_id",
                    format!("product {} is inactive or deleted", product.sku),
                )
                .into());
            }

            let selector = item
                .price
                .unwrap_or(PriceSelector::Category(self.ctx.policy.default_price_category));
            let unit_price = match item.unit_price {
                Some(price) => price,
                None => resolve_in(&mut tx, &product, selector, &shop.id, item.quantity).await?,
            };
            let subtotal = LineAmounts {
                unit_price,
                quantity: item.quantity,
                discount: item.discount_amount,
            }
            .subtotal()?;

            lines.push(PricedLine {
                request: item,
                product,
                unit_price,
                price_category_id: selector.category_id(),
                subtotal,
            });
        }

        // Availability, summed per product so split lines cannot oversell.
        if request.transaction_type == TransactionType::Sale {
            let mut demand: BTreeMap<&str, (&Product, i64)> = BTreeMap::new();
            for line in lines.iter().filter(|l| l.product.uses_stock) {
                demand
                    .entry(line.product.id.as_str())
                    .or_insert((&line.product, 0))
                    .1 += line.request.quantity;
            }
            for (product_id, (product, requested)) in demand {
                let available = fetch_record(&mut *tx, product_id, &shop.id)
                    .await?
                    .map_or(0, |r| r.stock);
                ensure_available(product_id, &product.sku, available, requested)?;
            }
        }

        let subtotals: Vec<Money> = lines.iter().map(|l| l.subtotal).collect();
        let totals = compute_totals(
            &subtotals,
            Charges {
                discount: request.discount_amount,
                tax: request.tax_amount,
                service_fee: request.service_fee,
            },
        )?;

        let now = Utc::now();
        let code = shop_code(&shop.name);
        let day = business_date(now, self.ctx.policy.utc_offset);
        let sequence = next_value(&mut tx, &invoice_scope(&code, day)).await?;
        let invoice = invoice_number(&code, day, sequence);

        let status = derive_status(totals.total, paid);
        let loyalty_points = match &request.customer_id {
            Some(_)
                if request.transaction_type == TransactionType::Sale
                    && status == PaymentStatus::Completed =>
            {
                totals.total.whole_units_of(self.ctx.policy.points_conversion_rate)
            }
            _ => 0,
        };

        let transaction = Transaction {
            id: new_id(),
            invoice_number: invoice.clone(),
            transaction_type: request.transaction_type,
            shop_id: shop.id.clone(),
            customer_id: request.customer_id.clone(),
            user_id: actor.user_id.clone(),
            subtotal: totals.subtotal,
            discount_amount: totals.discount,
            tax_amount: totals.tax,
            service_fee: totals.service_fee,
            total_amount: totals.total,
            payment_method_id: request.payment_method_id.clone(),
            payment_status: status,
            transaction_date: now,
            notes: request.notes.clone(),
            loyalty_points,
            reversal_of: None,
            created_at: now,
            updated_at: now,
        };
        insert_transaction(&mut tx, &transaction).await?;

        for line in &lines {
            insert_item(
                &mut tx,
                &TransactionItem {
                    id: new_id(),
                    transaction_id: transaction.id.clone(),
                    product_id: line.product.id.clone(),
                    price_category_id: line.price_category_id,
                    quantity: line.request.quantity,
                    unit_price: line.unit_price,
                    purchase_price: line.product.purchase_price,
                    discount_amount: line.request.discount_amount,
                    tax_amount: line.request.tax_amount,
                    subtotal: line.subtotal,
                },
            )
            .await?;
        }

        for payment in &request.payments {
            insert_payment(
                &mut tx,
                &TransactionPayment {
                    id: new_id(),
                    transaction_id: transaction.id.clone(),
                    payment_method_id: payment.payment_method_id.clone(),
                    amount: payment.amount,
                    reference: payment.reference.clone(),
                    payment_date: now,
                },
            )
            .await?;
        }

        let movement_type = request.transaction_type.movement_type();
        for line in lines.iter().filter(|l| l.product.uses_stock) {
            let adjustment = StockAdjustment {
                product_id: line.product.id.clone(),
                shop_id: shop.id.clone(),
                quantity: signed_quantity(
                    request.transaction_type,
                    line.request.quantity,
                    line.request.is_stock_addition,
                ),
                movement_type,
                reference: MovementReference::Transaction {
                    id: transaction.id.clone(),
                },
                user_id: actor.user_id.clone(),
                notes: Some(format!("{}: {}", request.transaction_type, invoice)),
            };
            apply_adjustment(&mut tx, &adjustment, None).await?;
        }

        if let (Some(customer_id), true) = (&request.customer_id, loyalty_points > 0) {
            add_points(&mut tx, customer_id, loyalty_points).await?;
        }

        let detail = load_detail(&mut tx, transaction).await?;
        tx.commit().await?;

        info!(
            invoice_number = %detail.transaction.invoice_number,
            transaction_type = %detail.transaction.transaction_type,
            total = %detail.transaction.total_amount,
            status = %detail.transaction.payment_status,
            lines = detail.items.len(),
            "Transaction created"
        );
        Ok(detail)
    }

    /// Appends a payment and recomputes the status.
    ///
    /// ## Errors
    /// - `PaymentExceedsBalance` when `amount` is above the remaining balance
    /// - `InvalidState` for a refunded or completed transaction
    #[instrument(skip(self, actor, payment), fields(user_id = %actor.user_id))]
    pub async fn add_payment(
        &self,
        actor: &Actor,
        invoice_number: &str,
        payment: NewPayment,
    ) -> EngineResult<TransactionDetail> {
        validate_required("payment_method_id", &payment.payment_method_id)?;
        validate_notes(payment.reference.as_deref())?;

        let _locks = self.ctx.lock([invoice_lock(invoice_number)]).await?;
        let mut tx = self.ctx.begin().await?;

        let transaction = fetch_by_invoice(&mut *tx, invoice_number)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", invoice_number))?;
        ensure_shop_access(actor, &transaction.shop_id)?;

        let paid = total_paid(&mut *tx, &transaction.id).await?;
        let status = apply_payment(
            invoice_number,
            transaction.payment_status,
            transaction.total_amount,
            paid,
            payment.amount,
        )?;

        let now = Utc::now();
        insert_payment(
            &mut tx,
            &TransactionPayment {
                id: new_id(),
                transaction_id: transaction.id.clone(),
                payment_method_id: payment.payment_method_id,
                amount: payment.amount,
                reference: payment.reference,
                payment_date: now,
            },
        )
        .await?;
        if status != transaction.payment_status {
            update_payment_status(&mut tx, &transaction.id, status, now).await?;
        }

        let transaction = Transaction {
            payment_status: status,
            updated_at: now,
            ..transaction
        };
        let detail = load_detail(&mut tx, transaction).await?;
        tx.commit().await?;

        debug!(paid = %detail.total_paid(), "Payment recorded");
        info!(invoice_number, amount = %payment.amount, status = %status, "Payment added");
        Ok(detail)
    }

    /// A transaction with its items and payments, if the actor can see its
    /// shop.
    pub async fn get_transaction(&self, actor: &Actor, invoice_number: &str) -> EngineResult<TransactionDetail> {
        let mut conn = self.ctx.pool.acquire().await?;
        let transaction = fetch_by_invoice(&mut *conn, invoice_number)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", invoice_number))?;
        ensure_shop_access(actor, &transaction.shop_id)?;
        Ok(load_detail(&mut conn, transaction).await?)
    }

    /// Transactions in the visible shops, newest first.
    pub async fn list_transactions(
        &self,
        visibility: &Visibility,
        filter: &TransactionFilter,
    ) -> EngineResult<Vec<Transaction>> {
        Ok(fetch_list(&self.ctx.pool, visibility, filter).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Transaction Rows
//!
//! Rows of `transactions`, `transaction_items` and `transaction_payments`.
//!
//! ## Data Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transactions (1) ──► (N) transaction_items     frozen at creation      │
//! │       │                                                                 │
//! │       └────────────► (N) transaction_payments  append-only              │
//! │                                                                         │
//! │  transactions.reversal_of ──► transactions.id   (VOID-… rows only)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use kasir_core::{
    Money, PaymentStatus, Transaction, TransactionDetail, TransactionItem, TransactionPayment,
    TransactionType, Visibility,
};

use crate::error::DbResult;
use crate::repository::push_visibility;

const TRANSACTION_COLUMNS: &str = "id, invoice_number, transaction_type, shop_id, customer_id, \
     user_id, subtotal, discount_amount, tax_amount, service_fee, total_amount, payment_method_id, \
     payment_status, transaction_date, notes, loyalty_points, reversal_of, created_at, updated_at";

/// Transaction list query. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub shop_id: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// =============================================================================
// Inserts
// =============================================================================

pub(crate) async fn insert_transaction(conn: &mut SqliteConnection, tx: &Transaction) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
    ))
    .bind(&tx.id)
    .bind(&tx.invoice_number)
    .bind(tx.transaction_type)
    .bind(&tx.shop_id)
    .bind(&tx.customer_id)
    .bind(&tx.user_id)
    .bind(tx.subtotal)
    .bind(tx.discount_amount)
    .bind(tx.tax_amount)
    .bind(tx.service_fee)
    .bind(tx.total_amount)
    .bind(&tx.payment_method_id)
    .bind(tx.payment_status)
    .bind(tx.transaction_date)
    .bind(&tx.notes)
    .bind(tx.loyalty_points)
    .bind(&tx.reversal_of)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &TransactionItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction_items (
            id, transaction_id, product_id, price_category_id, quantity,
            unit_price, purchase_price, discount_amount, tax_amount, subtotal
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.transaction_id)
    .bind(&item.product_id)
    .bind(item.price_category_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.purchase_price)
    .bind(item.discount_amount)
    .bind(item.tax_amount)
    .bind(item.subtotal)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_payment(
    conn: &mut SqliteConnection,
    payment: &TransactionPayment,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction_payments (
            id, transaction_id, payment_method_id, amount, reference, payment_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.transaction_id)
    .bind(&payment.payment_method_id)
    .bind(payment.amount)
    .bind(&payment.reference)
    .bind(payment.payment_date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Updates
// =============================================================================

pub(crate) async fn update_payment_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: PaymentStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE transactions SET payment_status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Terminal void marking: status `refunded` and the audit note.
pub(crate) async fn mark_refunded(
    conn: &mut SqliteConnection,
    id: &str,
    notes: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE transactions SET payment_status = 'refunded', notes = ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(notes)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

pub(crate) async fn fetch_by_invoice<'e, E>(
    executor: E,
    invoice_number: &str,
) -> DbResult<Option<Transaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let tx = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE invoice_number = ?1"
    ))
    .bind(invoice_number)
    .fetch_optional(executor)
    .await?;
    Ok(tx)
}

pub(crate) async fn fetch_items<'e, E>(executor: E, transaction_id: &str) -> DbResult<Vec<TransactionItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, TransactionItem>(
        r#"
        SELECT id, transaction_id, product_id, price_category_id, quantity,
               unit_price, purchase_price, discount_amount, tax_amount, subtotal
        FROM transaction_items
        WHERE transaction_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await?;
    Ok(items)
}

pub(crate) async fn fetch_payments<'e, E>(
    executor: E,
    transaction_id: &str,
) -> DbResult<Vec<TransactionPayment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payments = sqlx::query_as::<_, TransactionPayment>(
        r#"
        SELECT id, transaction_id, payment_method_id, amount, reference, payment_date
        FROM transaction_payments
        WHERE transaction_id = ?1
        ORDER BY payment_date, rowid
        "#,
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await?;
    Ok(payments)
}

pub(crate) async fn total_paid<'e, E>(executor: E, transaction_id: &str) -> DbResult<Money>
where
    E: Executor<'e, Database = Sqlite>,
{
    let cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM transaction_payments WHERE transaction_id = ?1",
    )
    .bind(transaction_id)
    .fetch_one(executor)
    .await?;
    Ok(Money::from_cents(cents))
}

/// Loads items and payments for `transaction`.
pub(crate) async fn load_detail(
    conn: &mut SqliteConnection,
    transaction: Transaction,
) -> DbResult<TransactionDetail> {
    let items = fetch_items(&mut *conn, &transaction.id).await?;
    let payments = fetch_payments(&mut *conn, &transaction.id).await?;
    Ok(TransactionDetail {
        transaction,
        items,
        payments,
    })
}

/// Transactions visible to the caller, newest first.
pub(crate) async fn fetch_list<'e, E>(
    executor: E,
    visibility: &Visibility,
    filter: &TransactionFilter,
) -> DbResult<Vec<Transaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1 = 1"
    ));
    if !push_visibility(&mut builder, "shop_id", visibility) {
        return Ok(Vec::new());
    }
    if let Some(shop_id) = &filter.shop_id {
        builder.push(" AND shop_id = ").push_bind(shop_id.clone());
    }
    if let Some(transaction_type) = filter.transaction_type {
        builder.push(" AND transaction_type = ").push_bind(transaction_type);
    }
    if let Some(status) = filter.payment_status {
        builder.push(" AND payment_status = ").push_bind(status);
    }
    if let Some(customer_id) = &filter.customer_id {
        builder.push(" AND customer_id = ").push_bind(customer_id.clone());
    }
    if let Some(from) = filter.from {
        builder.push(" AND transaction_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND transaction_date <= ").push_bind(to);
    }
    builder.push(" ORDER BY transaction_date DESC, rowid DESC");
    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ").push_bind(i64::from(limit));
    }

    let rows = builder
        .build_query_as::<Transaction>()
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

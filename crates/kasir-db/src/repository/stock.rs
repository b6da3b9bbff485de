//! # Stock Rows
//!
//! `product_stocks` holds the current level per (product, shop);
//! `stock_movements` is the append-only audit of every change to it.
//!
//! Writes here are raw row operations. The pairing rule (one level change,
//! one movement, same transaction) lives in [`crate::engine::ledger`].

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection};

use kasir_core::{
    new_id, MovementReference, MovementType, StockMovement, StockRecord, ValidationError,
    Visibility,
};

use crate::error::{DbError, DbResult};
use crate::repository::push_visibility;

// =============================================================================
// Filters
// =============================================================================

/// Movement history query. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub shop_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// =============================================================================
// Stock records
// =============================================================================

pub(crate) async fn fetch_record<'e, E>(
    executor: E,
    product_id: &str,
    shop_id: &str,
) -> DbResult<Option<StockRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, StockRecord>(
        r#"
        SELECT id, product_id, shop_id, stock, min_stock, updated_at
        FROM product_stocks
        WHERE product_id = ?1 AND shop_id = ?2
        "#,
    )
    .bind(product_id)
    .bind(shop_id)
    .fetch_optional(executor)
    .await?;
    Ok(record)
}

/// Writes `stock` to the record, creating it on first touch.
pub(crate) async fn upsert_level(
    conn: &mut SqliteConnection,
    product_id: &str,
    shop_id: &str,
    stock: i64,
    now: DateTime<Utc>,
) -> DbResult<StockRecord> {
    let record = sqlx::query_as::<_, StockRecord>(
        r#"
        INSERT INTO product_stocks (id, product_id, shop_id, stock, min_stock, updated_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5)
        ON CONFLICT(product_id, shop_id) DO UPDATE SET
            stock = excluded.stock,
            updated_at = excluded.updated_at
        RETURNING id, product_id, shop_id, stock, min_stock, updated_at
        "#,
    )
    .bind(new_id())
    .bind(product_id)
    .bind(shop_id)
    .bind(stock)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(record)
}

pub(crate) async fn upsert_min_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    shop_id: &str,
    min_stock: i64,
    now: DateTime<Utc>,
) -> DbResult<StockRecord> {
    let record = sqlx::query_as::<_, StockRecord>(
        r#"
        INSERT INTO product_stocks (id, product_id, shop_id, stock, min_stock, updated_at)
        VALUES (?1, ?2, ?3, 0, ?4, ?5)
        ON CONFLICT(product_id, shop_id) DO UPDATE SET
            min_stock = excluded.min_stock,
            updated_at = excluded.updated_at
        RETURNING id, product_id, shop_id, stock, min_stock, updated_at
        "#,
    )
    .bind(new_id())
    .bind(product_id)
    .bind(shop_id)
    .bind(min_stock)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(record)
}

/// Records at or below their reorder threshold, most depleted first.
pub(crate) async fn fetch_low_stock<'e, E>(
    executor: E,
    visibility: &Visibility,
) -> DbResult<Vec<StockRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, product_id, shop_id, stock, min_stock, updated_at \
         FROM product_stocks WHERE stock <= min_stock",
    );
    if !push_visibility(&mut builder, "shop_id", visibility) {
        return Ok(Vec::new());
    }
    builder.push(" ORDER BY stock - min_stock, shop_id, product_id");

    let records = builder
        .build_query_as::<StockRecord>()
        .fetch_all(executor)
        .await?;
    Ok(records)
}

// =============================================================================
// Movements
// =============================================================================

#[derive(Debug, FromRow)]
struct MovementRow {
    id: String,
    product_id: String,
    shop_id: String,
    quantity: i64,
    movement_type: MovementType,
    reference_type: String,
    reference_id: Option<String>,
    user_id: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = DbError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let reference = MovementReference::from_parts(&row.reference_type, row.reference_id)
            .map_err(|e: ValidationError| {
                DbError::Internal(format!("stock movement {} has a bad reference: {e}", row.id))
            })?;

        Ok(StockMovement {
            id: row.id,
            product_id: row.product_id,
            shop_id: row.shop_id,
            quantity: row.quantity,
            movement_type: row.movement_type,
            reference,
            user_id: row.user_id,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &StockMovement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, shop_id, quantity, movement_type,
            reference_type, reference_id, user_id, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.shop_id)
    .bind(movement.quantity)
    .bind(movement.movement_type)
    .bind(movement.reference.reference_type())
    .bind(movement.reference.reference_id())
    .bind(&movement.user_id)
    .bind(&movement.notes)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Movement history, oldest first.
pub(crate) async fn fetch_movements<'e, E>(
    executor: E,
    visibility: &Visibility,
    filter: &MovementFilter,
) -> DbResult<Vec<StockMovement>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, product_id, shop_id, quantity, movement_type, reference_type, \
         reference_id, user_id, notes, created_at FROM stock_movements WHERE 1 = 1",
    );
    if !push_visibility(&mut builder, "shop_id", visibility) {
        return Ok(Vec::new());
    }
    if let Some(product_id) = &filter.product_id {
        builder.push(" AND product_id = ").push_bind(product_id.clone());
    }
    if let Some(shop_id) = &filter.shop_id {
        builder.push(" AND shop_id = ").push_bind(shop_id.clone());
    }
    if let Some(movement_type) = filter.movement_type {
        builder.push(" AND movement_type = ").push_bind(movement_type);
    }
    if let Some(from) = filter.from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
    builder.push(" ORDER BY created_at, rowid");
    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ").push_bind(i64::from(limit));
    }

    let rows = builder
        .build_query_as::<MovementRow>()
        .fetch_all(executor)
        .await?;
    rows.into_iter().map(StockMovement::try_from).collect()
}

/// Σ movement quantities for one record (the replay of its history).
pub(crate) async fn sum_movements<'e, E>(executor: E, product_id: &str, shop_id: &str) -> DbResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM stock_movements WHERE product_id = ?1 AND shop_id = ?2",
    )
    .bind(product_id)
    .bind(shop_id)
    .fetch_one(executor)
    .await?;
    Ok(total)
}

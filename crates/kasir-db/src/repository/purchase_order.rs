//! # Purchase Order Rows

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use kasir_core::{PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Visibility};

use crate::error::DbResult;
use crate::repository::push_visibility;

const ORDER_COLUMNS: &str = "id, po_number, supplier_id, shop_id, status, total, notes, \
     created_by, received_by, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, purchase_order_id, product_id, quantity, received_quantity, unit_price, subtotal";

pub(crate) async fn insert_order(conn: &mut SqliteConnection, order: &PurchaseOrder) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO purchase_orders ({ORDER_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ))
    .bind(&order.id)
    .bind(&order.po_number)
    .bind(&order.supplier_id)
    .bind(&order.shop_id)
    .bind(order.status)
    .bind(order.total)
    .bind(&order.notes)
    .bind(&order.created_by)
    .bind(&order.received_by)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &PurchaseOrderItem) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO purchase_order_items ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    ))
    .bind(&item.id)
    .bind(&item.purchase_order_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.received_quantity)
    .bind(item.unit_price)
    .bind(item.subtotal)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Rewrites the editable header fields of a draft.
pub(crate) async fn update_header(conn: &mut SqliteConnection, order: &PurchaseOrder) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET supplier_id = ?1, shop_id = ?2, total = ?3, notes = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(&order.supplier_id)
    .bind(&order.shop_id)
    .bind(order.total)
    .bind(&order.notes)
    .bind(order.updated_at)
    .bind(&order.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: PurchaseOrderStatus,
    received_by: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = ?1, received_by = COALESCE(received_by, ?2), updated_at = ?3
        WHERE id = ?4
        "#,
    )
    .bind(status)
    .bind(received_by)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_received(
    conn: &mut SqliteConnection,
    item_id: &str,
    received_quantity: i64,
) -> DbResult<()> {
    sqlx::query("UPDATE purchase_order_items SET received_quantity = ?1 WHERE id = ?2")
        .bind(received_quantity)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn delete_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn delete_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    delete_items(&mut *conn, order_id).await?;
    sqlx::query("DELETE FROM purchase_orders WHERE id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn fetch_order<'e, E>(executor: E, id: &str) -> DbResult<Option<PurchaseOrder>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(order)
}

pub(crate) async fn fetch_items<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<PurchaseOrderItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, PurchaseOrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY rowid"
    ))
    .bind(order_id)
    .fetch_all(executor)
    .await?;
    Ok(items)
}

/// Orders visible to the caller, newest first.
pub(crate) async fn fetch_list<'e, E>(
    executor: E,
    visibility: &Visibility,
    status: Option<PurchaseOrderStatus>,
) -> DbResult<Vec<PurchaseOrder>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE 1 = 1"
    ));
    if !push_visibility(&mut builder, "shop_id", visibility) {
        return Ok(Vec::new());
    }
    if let Some(status) = status {
        builder.push(" AND status = ").push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC, rowid DESC");

    let orders = builder
        .build_query_as::<PurchaseOrder>()
        .fetch_all(executor)
        .await?;
    Ok(orders)
}

//! # Stock Opname Rows

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection};

use kasir_core::{OpnameStatus, StockOpname, StockOpnameItem, Visibility};

use crate::error::DbResult;
use crate::repository::push_visibility;

const OPNAME_COLUMNS: &str = "id, shop_id, status, conducted_by, approved_by, opname_date, \
     notes, approved_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, stock_opname_id, product_id, system_stock, physical_stock, variance, notes";

pub(crate) async fn insert_opname(conn: &mut SqliteConnection, opname: &StockOpname) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO stock_opnames ({OPNAME_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    ))
    .bind(&opname.id)
    .bind(&opname.shop_id)
    .bind(opname.status)
    .bind(&opname.conducted_by)
    .bind(&opname.approved_by)
    .bind(opname.opname_date)
    .bind(&opname.notes)
    .bind(opname.approved_at)
    .bind(opname.created_at)
    .bind(opname.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &StockOpnameItem) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO stock_opname_items ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    ))
    .bind(&item.id)
    .bind(&item.stock_opname_id)
    .bind(&item.product_id)
    .bind(item.system_stock)
    .bind(item.physical_stock)
    .bind(item.variance)
    .bind(&item.notes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_header(conn: &mut SqliteConnection, opname: &StockOpname) -> DbResult<()> {
    sqlx::query(
        "UPDATE stock_opnames SET opname_date = ?1, notes = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .bind(opname.opname_date)
    .bind(&opname.notes)
    .bind(opname.updated_at)
    .bind(&opname.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: OpnameStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE stock_opnames SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn mark_approved(
    conn: &mut SqliteConnection,
    id: &str,
    approved_by: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE stock_opnames
        SET status = 'approved', approved_by = ?1, approved_at = ?2, updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(approved_by)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn delete_items(conn: &mut SqliteConnection, opname_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM stock_opname_items WHERE stock_opname_id = ?1")
        .bind(opname_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn delete_opname(conn: &mut SqliteConnection, opname_id: &str) -> DbResult<()> {
    delete_items(&mut *conn, opname_id).await?;
    sqlx::query("DELETE FROM stock_opnames WHERE id = ?1")
        .bind(opname_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn fetch_opname<'e, E>(executor: E, id: &str) -> DbResult<Option<StockOpname>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let opname = sqlx::query_as::<_, StockOpname>(&format!(
        "SELECT {OPNAME_COLUMNS} FROM stock_opnames WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(opname)
}

pub(crate) async fn fetch_items<'e, E>(executor: E, opname_id: &str) -> DbResult<Vec<StockOpnameItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, StockOpnameItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM stock_opname_items WHERE stock_opname_id = ?1 ORDER BY rowid"
    ))
    .bind(opname_id)
    .fetch_all(executor)
    .await?;
    Ok(items)
}

pub(crate) async fn fetch_list<'e, E>(
    executor: E,
    visibility: &Visibility,
    status: Option<OpnameStatus>,
) -> DbResult<Vec<StockOpname>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {OPNAME_COLUMNS} FROM stock_opnames WHERE 1 = 1"
    ));
    if !push_visibility(&mut builder, "shop_id", visibility) {
        return Ok(Vec::new());
    }
    if let Some(status) = status {
        builder.push(" AND status = ").push_bind(status);
    }
    builder.push(" ORDER BY opname_date DESC, rowid DESC");

    let opnames = builder
        .build_query_as::<StockOpname>()
        .fetch_all(executor)
        .await?;
    Ok(opnames)
}

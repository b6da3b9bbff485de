//! # Customer Repository
//!
//! Customers exist here only as far as the engine needs them: to validate a
//! transaction's `customer_id` and to hold loyalty points.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use kasir_core::validation::validate_required;
use kasir_core::{new_id, Customer};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, name: &str) -> DbResult<Customer> {
        validate_required("name", name)?;

        let customer = Customer {
            id: new_id(),
            name: name.trim().to_string(),
            loyalty_points: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO customers (id, name, loyalty_points, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.loyalty_points)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        fetch_customer(&self.pool, id).await
    }
}

pub(crate) async fn fetch_customer<'e, E>(executor: E, id: &str) -> DbResult<Option<Customer>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT id, name, loyalty_points, created_at FROM customers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(customer)
}

/// Adds `delta` points (negative to take them back).
pub(crate) async fn add_points(conn: &mut SqliteConnection, id: &str, delta: i64) -> DbResult<()> {
    let result = sqlx::query("UPDATE customers SET loyalty_points = loyalty_points + ?1 WHERE id = ?2")
        .bind(delta)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    debug!(customer_id = %id, delta, "Loyalty points changed");
    Ok(())
}

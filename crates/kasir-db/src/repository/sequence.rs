//! Named monotonic counters for invoice and purchase-order numbers.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

/// Increments `scope` and returns the new value (1 for a fresh scope).
///
/// A single upsert, so two writers can never read the same value. Call it
/// inside the write transaction that uses the number.
pub(crate) async fn next_value(conn: &mut SqliteConnection, scope: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequence_counters (scope, value) VALUES (?1, 1)
        ON CONFLICT(scope) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(scope)
    .fetch_one(&mut *conn)
    .await?;

    debug!(scope, value, "Sequence advanced");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_scopes_count_independently() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_value(&mut conn, "invoice:TOK-20260314").await.unwrap(), 1);
        assert_eq!(next_value(&mut conn, "invoice:TOK-20260314").await.unwrap(), 2);
        assert_eq!(next_value(&mut conn, "invoice:WAR-20260314").await.unwrap(), 1);
        assert_eq!(next_value(&mut conn, "invoice:TOK-20260314").await.unwrap(), 3);
    }
}

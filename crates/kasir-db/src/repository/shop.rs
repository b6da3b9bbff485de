//! # Shop Repository

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;

use kasir_core::validation::validate_required;
use kasir_core::{new_id, Shop};

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShopRepository { pool }
    }

    /// Creates an active shop.
    pub async fn insert(&self, name: &str) -> DbResult<Shop> {
        validate_required("name", name)?;

        let shop = Shop {
            id: new_id(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO shops (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&shop.id)
            .bind(&shop.name)
            .bind(shop.is_active)
            .bind(shop.created_at)
            .execute(&self.pool)
            .await?;

        info!(shop_id = %shop.id, name = %shop.name, "Shop created");
        Ok(shop)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shop>> {
        fetch_shop(&self.pool, id).await
    }

    pub async fn list(&self) -> DbResult<Vec<Shop>> {
        let shops = sqlx::query_as::<_, Shop>(
            "SELECT id, name, is_active, created_at FROM shops ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(shops)
    }
}

pub(crate) async fn fetch_shop<'e, E>(executor: E, id: &str) -> DbResult<Option<Shop>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let shop = sqlx::query_as::<_, Shop>(
        "SELECT id, name, is_active, created_at FROM shops WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(shop)
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let shop = db.shops().insert("Toko Makmur").await.unwrap();

        let found = db.shops().get_by_id(&shop.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Toko Makmur");
        assert!(found.is_active);
        assert!(db.shops().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.shops().insert("   ").await.is_err());
    }
}

//! # Product Repository
//!
//! Products and their price lists.
//!
//! ## Key Operations
//! - Catalog CRUD (insert, lookup, activate, soft delete)
//! - Price rules per category and wholesale quantity breaks
//! - Purchase price updates when goods are received
//!
//! ## Price Lists
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products            price_rules                wholesale_prices       │
//! │  ─────────           ───────────                ────────────────       │
//! │  INDOMIE  3.50   ◄── cat 1, shop NULL, ≥1  3.50  ≥10  3.20 (active)     │
//! │                  ◄── cat 1, shop A,    ≥5  3.30  ≥50  3.00 (active)     │
//! │                  ◄── cat 2, shop NULL, ≥1  3.40                         │
//! │                                                                         │
//! │  Candidate rows are loaded here; kasir_core::pricing picks the winner. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use kasir_core::validation::{
    validate_money_non_negative, validate_product_name, validate_required, validate_sku,
};
use kasir_core::{new_id, Money, PriceRule, Product, ValidationError, WholesalePrice};

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, sku, name, selling_price, purchase_price, uses_stock, \
     is_active, created_at, updated_at, deleted_at";

/// Input for a new catalog product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub selling_price: Money,
    pub purchase_price: Money,
    pub uses_stock: bool,
}

#[derive(Debug, Clone)]
pub struct NewPriceRule {
    pub product_id: String,
    /// `None` applies to every shop.
    pub shop_id: Option<String>,
    pub price_category_id: i64,
    pub min_quantity: i64,
    pub price: Money,
}

#[derive(Debug, Clone)]
pub struct NewWholesalePrice {
    pub product_id: String,
    pub shop_id: Option<String>,
    pub min_quantity: i64,
    pub price: Money,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.insert(NewProduct { .. }).await?;
/// repo.add_price_rule(NewPriceRule { product_id: product.id.clone(), .. }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new active product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        validate_sku(&new.sku)?;
        validate_product_name(&new.name)?;
        validate_money_non_negative("selling_price", new.selling_price)?;
        validate_money_non_negative("purchase_price", new.purchase_price)?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            selling_price: new.selling_price,
            purchase_price: new.purchase_price,
            uses_stock: new.uses_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, selling_price, purchase_price, uses_stock,
                is_active, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.selling_price)
        .bind(product.purchase_price)
        .bind(product.uses_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.sku.clone(),
            },
            other => other,
        })?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Gets a product by ID, including soft-deleted ones.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Gets a product by SKU, including soft-deleted ones.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Activates or deactivates a product. Inactive products cannot be sold.
    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Soft-deletes a product. Its stock records and movements are kept.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = %id, "Product soft-deleted");
        Ok(())
    }

    pub async fn add_price_rule(&self, new: NewPriceRule) -> DbResult<PriceRule> {
        validate_tier(new.min_quantity, new.price)?;

        let rule = PriceRule {
            id: new_id(),
            product_id: new.product_id,
            shop_id: new.shop_id,
            price_category_id: new.price_category_id,
            min_quantity: new.min_quantity,
            price: new.price,
        };

        sqlx::query(
            r#"
            INSERT INTO price_rules (id, product_id, shop_id, price_category_id, min_quantity, price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.product_id)
        .bind(&rule.shop_id)
        .bind(rule.price_category_id)
        .bind(rule.min_quantity)
        .bind(rule.price)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %rule.product_id, category = rule.price_category_id, "Price rule added");
        Ok(rule)
    }

    pub async fn add_wholesale_price(&self, new: NewWholesalePrice) -> DbResult<WholesalePrice> {
        validate_tier(new.min_quantity, new.price)?;

        let tier = WholesalePrice {
            id: new_id(),
            product_id: new.product_id,
            shop_id: new.shop_id,
            min_quantity: new.min_quantity,
            price: new.price,
            is_active: true,
        };

        sqlx::query(
            r#"
            INSERT INTO wholesale_prices (id, product_id, shop_id, min_quantity, price, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&tier.id)
        .bind(&tier.product_id)
        .bind(&tier.shop_id)
        .bind(tier.min_quantity)
        .bind(tier.price)
        .bind(tier.is_active)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %tier.product_id, min_quantity = tier.min_quantity, "Wholesale price added");
        Ok(tier)
    }

    pub async fn price_rules(&self, product_id: &str) -> DbResult<Vec<PriceRule>> {
        fetch_price_rules(&self.pool, product_id).await
    }

    pub async fn wholesale_prices(&self, product_id: &str) -> DbResult<Vec<WholesalePrice>> {
        fetch_wholesale_prices(&self.pool, product_id).await
    }
}

fn validate_tier(min_quantity: i64, price: Money) -> Result<(), ValidationError> {
    if min_quantity < 1 {
        return Err(ValidationError::MustBePositive {
            field: "min_quantity".to_string(),
        });
    }
    validate_money_non_negative("price", price)
}

// =============================================================================
// Row helpers
// =============================================================================

pub(crate) async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    validate_required("product_id", id)?;

    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(product)
}

/// Every price rule of the product, all categories and shops.
pub(crate) async fn fetch_price_rules<'e, E>(executor: E, product_id: &str) -> DbResult<Vec<PriceRule>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rules = sqlx::query_as::<_, PriceRule>(
        r#"
        SELECT id, product_id, shop_id, price_category_id, min_quantity, price
        FROM price_rules
        WHERE product_id = ?1
        ORDER BY price_category_id, min_quantity
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(rules)
}

pub(crate) async fn fetch_wholesale_prices<'e, E>(
    executor: E,
    product_id: &str,
) -> DbResult<Vec<WholesalePrice>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let tiers = sqlx::query_as::<_, WholesalePrice>(
        r#"
        SELECT id, product_id, shop_id, min_quantity, price, is_active
        FROM wholesale_prices
        WHERE product_id = ?1
        ORDER BY min_quantity
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(tiers)
}

/// Records the latest cost basis after a receipt.
pub(crate) async fn update_purchase_price(
    conn: &mut SqliteConnection,
    id: &str,
    purchase_price: Money,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET purchase_price = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(purchase_price)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

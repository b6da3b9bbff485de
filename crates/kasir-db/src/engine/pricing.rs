//! # Price Resolver
//!
//! Loads a product's candidate price rows and hands them to
//! [`kasir_core::pricing::resolve_price`]. Read-only.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use kasir_core::pricing::{resolve_price, PriceSelector};
use kasir_core::{CoreError, Money, Product};

use crate::engine::error::EngineResult;
use crate::repository::product::{fetch_price_rules, fetch_product, fetch_wholesale_prices};

#[derive(Debug, Clone)]
pub struct PricingResolver {
    pool: SqlitePool,
}

impl PricingResolver {
    pub fn new(pool: SqlitePool) -> Self {
        PricingResolver { pool }
    }

    /// Unit price of `product_id` when `quantity` units are sold at `shop_id`.
    ///
    /// ## Errors
    /// `NotFound` when the product does not exist.
    #[instrument(skip(self))]
    pub async fn resolve_price(
        &self,
        product_id: &str,
        selector: PriceSelector,
        shop_id: &str,
        quantity: i64,
    ) -> EngineResult<Money> {
        let mut conn = self.pool.acquire().await?;
        let product = fetch_product(&mut *conn, product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", product_id))?;

        resolve_in(&mut conn, &product, selector, shop_id, quantity).await
    }
}

/// Same resolution on a caller's connection (inside an engine transaction).
pub(crate) async fn resolve_in(
    conn: &mut SqliteConnection,
    product: &Product,
    selector: PriceSelector,
    shop_id: &str,
    quantity: i64,
) -> EngineResult<Money> {
    let rules = match selector {
        PriceSelector::Category(_) => fetch_price_rules(&mut *conn, &product.id).await?,
        PriceSelector::Base | PriceSelector::Wholesale => Vec::new(),
    };
    let wholesale = match selector {
        PriceSelector::Wholesale => fetch_wholesale_prices(&mut *conn, &product.id).await?,
        PriceSelector::Base | PriceSelector::Category(_) => Vec::new(),
    };

    let price = resolve_price(product, &rules, &wholesale, selector, shop_id, quantity);
    debug!(product_id = %product.id, ?selector, quantity, price = %price, "Price resolved");
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::{EngineError, ErrorCode};
    use crate::repository::product::{NewPriceRule, NewWholesalePrice};
    use crate::testing::{fixture, product};

    #[tokio::test]
    async fn test_shop_specific_tiers_win() {
        let fx = fixture().await;
        let p = product(&fx.db, "KOPI-1", 100, true).await;

        for (shop_id, min_quantity, price) in [
            (None, 1, 100),
            (Some(fx.shop_a.id.clone()), 5, 90),
            (Some(fx.shop_a.id.clone()), 1, 95),
        ] {
            fx.db
                .products()
                .add_price_rule(NewPriceRule {
                    product_id: p.id.clone(),
                    shop_id,
                    price_category_id: 1,
                    min_quantity,
                    price: Money::from_cents(price),
                })
                .await
                .unwrap();
        }

        let pricing = fx.db.pricing();
        let cat = PriceSelector::Category(1);
        assert_eq!(pricing.resolve_price(&p.id, cat, &fx.shop_a.id, 5).await.unwrap().cents(), 90);
        assert_eq!(pricing.resolve_price(&p.id, cat, &fx.shop_a.id, 3).await.unwrap().cents(), 95);
        assert_eq!(pricing.resolve_price(&p.id, cat, &fx.shop_b.id, 1).await.unwrap().cents(), 100);
    }

    #[tokio::test]
    async fn test_unmatched_category_and_base_fall_back() {
        let fx = fixture().await;
        let p = product(&fx.db, "KOPI-2", 1_250, true).await;
        fx.db
            .products()
            .add_price_rule(NewPriceRule {
                product_id: p.id.clone(),
                shop_id: None,
                price_category_id: 1,
                min_quantity: 10,
                price: Money::from_cents(1_000),
            })
            .await
            .unwrap();

        let pricing = fx.db.pricing();
        // Below every tier.
        let below = pricing
            .resolve_price(&p.id, PriceSelector::Category(1), &fx.shop_a.id, 9)
            .await
            .unwrap();
        assert_eq!(below.cents(), 1_250);
        // Category without rules.
        let other = pricing
            .resolve_price(&p.id, PriceSelector::Category(2), &fx.shop_a.id, 50)
            .await
            .unwrap();
        assert_eq!(other.cents(), 1_250);
        let base = pricing
            .resolve_price(&p.id, PriceSelector::Base, &fx.shop_a.id, 50)
            .await
            .unwrap();
        assert_eq!(base.cents(), 1_250);
    }

    #[tokio::test]
    async fn test_wholesale_breaks() {
        let fx = fixture().await;
        let p = product(&fx.db, "GULA-1", 1_500, true).await;
        fx.db
            .products()
            .add_wholesale_price(NewWholesalePrice {
                product_id: p.id.clone(),
                shop_id: None,
                min_quantity: 12,
                price: Money::from_cents(1_300),
            })
            .await
            .unwrap();

        let pricing = fx.db.pricing();
        let at_12 = pricing
            .resolve_price(&p.id, PriceSelector::Wholesale, &fx.shop_a.id, 12)
            .await
            .unwrap();
        assert_eq!(at_12.cents(), 1_300);
        let at_11 = pricing
            .resolve_price(&p.id, PriceSelector::Wholesale, &fx.shop_a.id, 11)
            .await
            .unwrap();
        assert_eq!(at_11.cents(), 1_500);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let fx = fixture().await;
        let err = fx
            .db
            .pricing()
            .resolve_price("missing", PriceSelector::Base, &fx.shop_a.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}

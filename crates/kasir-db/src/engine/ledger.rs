//! # Stock Ledger
//!
//! The only code that changes `product_stocks`. Every level change writes
//! exactly one `stock_movements` row in the same SQLite transaction, so a
//! record's stock always equals the sum of its movements.
//!
//! ## Adjust Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust(product, shop, -5, sale)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock "stock:{shop}:{product}"    ── concurrent adjusts queue here     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                                                        │
//! │  current = product_stocks.stock (0 when no row)                         │
//! │  next    = current + delta                                              │
//! │       │                                                                 │
//! │       ├── next < 0 and type ∈ {sale, transfer} ──► InsufficientStock    │
//! │       │                                            (ROLLBACK)           │
//! │       ▼                                                                 │
//! │  UPSERT product_stocks.stock = next                                     │
//! │  INSERT stock_movements (quantity = delta, reference)                   │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Other engines call [`apply_adjustment`] inside their own transaction,
//! holding the stock keys they locked up front.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use kasir_core::stock::{apply_delta, StockKey};
use kasir_core::validation::{validate_notes, validate_quantity, validate_stock_level};
use kasir_core::{
    new_id, CoreError, MovementReference, MovementType, StockMovement, StockRecord,
    ValidationError, Visibility,
};

use crate::engine::error::EngineResult;
use crate::engine::EngineContext;
use crate::repository::product::fetch_product;
use crate::repository::shop::fetch_shop;
use crate::repository::stock::{
    fetch_low_stock, fetch_movements, fetch_record, insert_movement, sum_movements,
    upsert_level, upsert_min_stock, MovementFilter,
};

/// One signed stock change and why it happened.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub product_id: String,
    pub shop_id: String,
    /// Signed: positive adds stock, negative removes it.
    pub quantity: i64,
    pub movement_type: MovementType,
    pub reference: MovementReference,
    pub user_id: String,
    pub notes: Option<String>,
}

impl StockAdjustment {
    pub fn key(&self) -> StockKey {
        StockKey::new(&self.product_id, &self.shop_id)
    }
}

/// Applies one adjustment on `conn`. The caller holds the stock key and the
/// transaction.
///
/// `movement_id` lets a caller pre-allocate the movement id (transfers point
/// each leg at the other).
pub(crate) async fn apply_adjustment(
    conn: &mut SqliteConnection,
    adjustment: &StockAdjustment,
    movement_id: Option<String>,
) -> EngineResult<(StockRecord, StockMovement)> {
    if adjustment.quantity == 0 {
        return Err(ValidationError::invalid("quantity", "a stock movement cannot be zero").into());
    }

    let product = fetch_product(&mut *conn, &adjustment.product_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", &adjustment.product_id))?;

    let current = fetch_record(&mut *conn, &adjustment.product_id, &adjustment.shop_id)
        .await?
        .map_or(0, |record| record.stock);
    let next = apply_delta(
        &product.id,
        &product.sku,
        current,
        adjustment.quantity,
        adjustment.movement_type,
    )?;

    let now = Utc::now();
    let record = upsert_level(&mut *conn, &adjustment.product_id, &adjustment.shop_id, next, now).await?;

    let movement = StockMovement {
        id: movement_id.unwrap_or_else(new_id),
        product_id: adjustment.product_id.clone(),
        shop_id: adjustment.shop_id.clone(),
        quantity: adjustment.quantity,
        movement_type: adjustment.movement_type,
        reference: adjustment.reference.clone(),
        user_id: adjustment.user_id.clone(),
        notes: adjustment.notes.clone(),
        created_at: now,
    };
    insert_movement(&mut *conn, &movement).await?;

    debug!(
        product_id = %movement.product_id,
        shop_id = %movement.shop_id,
        delta = movement.quantity,
        movement_type = %movement.movement_type,
        stock = record.stock,
        "Stock adjusted"
    );
    Ok((record, movement))
}

/// Stock levels and their movement history.
#[derive(Debug, Clone)]
pub struct StockLedger {
    ctx: EngineContext,
}

impl StockLedger {
    pub(crate) fn new(ctx: EngineContext) -> Self {
        StockLedger { ctx }
    }

    /// Current stock, 0 when the product was never stocked at the shop.
    pub async fn get_stock(&self, product_id: &str, shop_id: &str) -> EngineResult<i64> {
        let mut conn = self.ctx.pool.acquire().await?;
        if fetch_product(&mut *conn, product_id).await?.is_none() {
            return Err(CoreError::not_found("Product", product_id).into());
        }
        let record = fetch_record(&mut *conn, product_id, shop_id).await?;
        Ok(record.map_or(0, |r| r.stock))
    }

    pub async fn get_record(&self, product_id: &str, shop_id: &str) -> EngineResult<Option<StockRecord>> {
        Ok(fetch_record(&self.ctx.pool, product_id, shop_id).await?)
    }

    /// Applies one signed change and writes its movement.
    #[instrument(skip(self), fields(product_id = %adjustment.product_id, shop_id = %adjustment.shop_id))]
    pub async fn adjust(&self, adjustment: StockAdjustment) -> EngineResult<StockRecord> {
        validate_notes(adjustment.notes.as_deref())?;

        let _locks = self.ctx.lock([adjustment.key().to_string()]).await?;
        let mut tx = self.ctx.begin().await?;

        if fetch_shop(&mut *tx, &adjustment.shop_id).await?.is_none() {
            return Err(CoreError::not_found("Shop", &adjustment.shop_id).into());
        }
        let (record, _) = apply_adjustment(&mut tx, &adjustment, None).await?;
        tx.commit().await?;

        info!(
            delta = adjustment.quantity,
            movement_type = %adjustment.movement_type,
            stock = record.stock,
            "Stock adjustment committed"
        );
        Ok(record)
    }

    /// Moves `quantity` units between two shops.
    ///
    /// Both legs are `transfer` movements whose references name each other.
    /// The source may not go below zero.
    #[instrument(skip(self, notes))]
    pub async fn transfer(
        &self,
        product_id: &str,
        from_shop_id: &str,
        to_shop_id: &str,
        quantity: i64,
        user_id: &str,
        notes: Option<String>,
    ) -> EngineResult<(StockRecord, StockRecord)> {
        validate_quantity(quantity)?;
        validate_notes(notes.as_deref())?;
        if from_shop_id == to_shop_id {
            return Err(ValidationError::invalid(
                "to_shop_id",
                "a transfer needs two different shops",
            )
            .into());
        }

        let _locks = self
            .ctx
            .lock([
                StockKey::new(product_id, from_shop_id).to_string(),
                StockKey::new(product_id, to_shop_id).to_string(),
            ])
            .await?;
        let mut tx = self.ctx.begin().await?;

        for shop_id in [from_shop_id, to_shop_id] {
            if fetch_shop(&mut *tx, shop_id).await?.is_none() {
                return Err(CoreError::not_found("Shop", shop_id).into());
            }
        }

        let out_id = new_id();
        let in_id = new_id();
        let leg = |shop_id: &str, quantity: i64, counterpart: &str| StockAdjustment {
            product_id: product_id.to_string(),
            shop_id: shop_id.to_string(),
            quantity,
            movement_type: MovementType::Transfer,
            reference: MovementReference::Transfer {
                counterpart: counterpart.to_string(),
            },
            user_id: user_id.to_string(),
            notes: notes.clone(),
        };

        let (source, _) =
            apply_adjustment(&mut tx, &leg(from_shop_id, -quantity, &in_id), Some(out_id.clone())).await?;
        let (target, _) =
            apply_adjustment(&mut tx, &leg(to_shop_id, quantity, &out_id), Some(in_id)).await?;
        tx.commit().await?;

        info!(
            quantity,
            source_stock = source.stock,
            target_stock = target.stock,
            "Stock transferred"
        );
        Ok((source, target))
    }

    /// Sets an absolute level, recording the difference as an `adjustment`.
    /// No movement is written when the level is unchanged.
    #[instrument(skip(self, notes))]
    pub async fn set_level(
        &self,
        product_id: &str,
        shop_id: &str,
        new_level: i64,
        user_id: &str,
        notes: Option<String>,
    ) -> EngineResult<StockRecord> {
        validate_stock_level("stock", new_level)?;
        validate_notes(notes.as_deref())?;

        let _locks = self.ctx.lock([StockKey::new(product_id, shop_id).to_string()]).await?;
        let mut tx = self.ctx.begin().await?;

        if fetch_product(&mut *tx, product_id).await?.is_none() {
            return Err(CoreError::not_found("Product", product_id).into());
        }
        if fetch_shop(&mut *tx, shop_id).await?.is_none() {
            return Err(CoreError::not_found("Shop", shop_id).into());
        }

        let current = fetch_record(&mut *tx, product_id, shop_id)
            .await?
            .map_or(0, |r| r.stock);
        let delta = new_level - current;

        let record = if delta == 0 {
            upsert_level(&mut tx, product_id, shop_id, current, Utc::now()).await?
        } else {
            let adjustment = StockAdjustment {
                product_id: product_id.to_string(),
                shop_id: shop_id.to_string(),
                quantity: delta,
                movement_type: MovementType::Adjustment,
                reference: MovementReference::ManualAdjustment,
                user_id: user_id.to_string(),
                notes,
            };
            apply_adjustment(&mut tx, &adjustment, None).await?.0
        };
        tx.commit().await?;

        info!(from = current, to = new_level, "Stock level set");
        Ok(record)
    }

    /// Sets the reorder threshold.
    pub async fn set_min_stock(
        &self,
        product_id: &str,
        shop_id: &str,
        min_stock: i64,
    ) -> EngineResult<StockRecord> {
        validate_stock_level("min_stock", min_stock)?;

        let _locks = self.ctx.lock([StockKey::new(product_id, shop_id).to_string()]).await?;
        let mut tx = self.ctx.begin().await?;
        if fetch_product(&mut *tx, product_id).await?.is_none() {
            return Err(CoreError::not_found("Product", product_id).into());
        }
        if fetch_shop(&mut *tx, shop_id).await?.is_none() {
            return Err(CoreError::not_found("Shop", shop_id).into());
        }
        let record = upsert_min_stock(&mut tx, product_id, shop_id, min_stock, Utc::now()).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Movement history visible to the caller, oldest first.
    pub async fn movements(
        &self,
        visibility: &Visibility,
        filter: &MovementFilter,
    ) -> EngineResult<Vec<StockMovement>> {
        Ok(fetch_movements(&self.ctx.pool, visibility, filter).await?)
    }

    /// Records at or below their reorder threshold.
    pub async fn low_stock(&self, visibility: &Visibility) -> EngineResult<Vec<StockRecord>> {
        Ok(fetch_low_stock(&self.ctx.pool, visibility).await?)
    }

    /// Σ of every movement for (product, shop). Equals the stored level.
    pub async fn movement_total(&self, product_id: &str, shop_id: &str) -> EngineResult<i64> {
        Ok(sum_movements(&self.ctx.pool, product_id, shop_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::{EngineError, ErrorCode};
    use crate::testing::{fixture, product, stock_up};

    fn sale(product_id: &str, shop_id: &str, quantity: i64) -> StockAdjustment {
        StockAdjustment {
            product_id: product_id.to_string(),
            shop_id: shop_id.to_string(),
            quantity: -quantity,
            movement_type: MovementType::Sale,
            reference: MovementReference::ManualAdjustment,
            user_id: "u-cashier".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_stock_equals_replayed_movements() {
        let fx = fixture().await;
        let p = product(&fx.db, "BERAS-5", 6_500, true).await;
        let ledger = fx.db.ledger();

        stock_up(&fx.db, &p.id, &fx.shop_a.id, 20).await;
        ledger.adjust(sale(&p.id, &fx.shop_a.id, 7)).await.unwrap();
        ledger
            .set_level(&p.id, &fx.shop_a.id, 15, "u-owner", Some("recount".into()))
            .await
            .unwrap();
        ledger
            .transfer(&p.id, &fx.shop_a.id, &fx.shop_b.id, 4, "u-owner", None)
            .await
            .unwrap();

        for shop_id in [&fx.shop_a.id, &fx.shop_b.id] {
            let stock = ledger.get_stock(&p.id, shop_id).await.unwrap();
            let replayed = ledger.movement_total(&p.id, shop_id).await.unwrap();
            assert_eq!(stock, replayed);
        }
        assert_eq!(ledger.get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 11);
        assert_eq!(ledger.get_stock(&p.id, &fx.shop_b.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_oversell_is_rejected_without_writes() {
        let fx = fixture().await;
        let p = product(&fx.db, "TEH-1", 400, true).await;
        let ledger = fx.db.ledger();
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 3).await;

        let err = ledger.adjust(sale(&p.id, &fx.shop_a.id, 5)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));

        assert_eq!(ledger.get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 3);
        let history = ledger
            .movements(
                &Visibility::All,
                &MovementFilter {
                    product_id: Some(p.id.clone()),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_serialize() {
        let fx = fixture().await;
        let p = product(&fx.db, "SUSU-1", 900, true).await;
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 8).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = fx.db.ledger();
            let adjustment = sale(&p.id, &fx.shop_a.id, 5);
            handles.push(tokio::spawn(async move { ledger.adjust(adjustment).await }));
        }

        let mut failures = 0;
        for handle in handles {
            if let Err(err) = handle.await.unwrap() {
                assert_eq!(err.code(), ErrorCode::InsufficientStock);
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
        assert_eq!(fx.db.ledger().get_stock(&p.id, &fx.shop_a.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_transfer_legs_reference_each_other() {
        let fx = fixture().await;
        let p = product(&fx.db, "MINYAK-2", 3_200, true).await;
        let ledger = fx.db.ledger();
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 10).await;

        ledger
            .transfer(&p.id, &fx.shop_a.id, &fx.shop_b.id, 6, "u-owner", None)
            .await
            .unwrap();

        let legs = ledger
            .movements(
                &Visibility::All,
                &MovementFilter {
                    product_id: Some(p.id.clone()),
                    movement_type: Some(MovementType::Transfer),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(legs.len(), 2);
        let out = legs.iter().find(|m| m.quantity == -6).unwrap();
        let inbound = legs.iter().find(|m| m.quantity == 6).unwrap();
        assert_eq!(
            out.reference,
            MovementReference::Transfer {
                counterpart: inbound.id.clone()
            }
        );
        assert_eq!(
            inbound.reference,
            MovementReference::Transfer {
                counterpart: out.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_transfer_rules() {
        let fx = fixture().await;
        let p = product(&fx.db, "MINYAK-1", 3_200, true).await;
        let ledger = fx.db.ledger();
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 2).await;

        let same = ledger
            .transfer(&p.id, &fx.shop_a.id, &fx.shop_a.id, 1, "u-owner", None)
            .await
            .unwrap_err();
        assert_eq!(same.code(), ErrorCode::ValidationError);

        let zero = ledger
            .transfer(&p.id, &fx.shop_a.id, &fx.shop_b.id, 0, "u-owner", None)
            .await
            .unwrap_err();
        assert_eq!(zero.code(), ErrorCode::ValidationError);

        let short = ledger
            .transfer(&p.id, &fx.shop_a.id, &fx.shop_b.id, 3, "u-owner", None)
            .await
            .unwrap_err();
        assert_eq!(short.code(), ErrorCode::InsufficientStock);
        assert_eq!(ledger.get_stock(&p.id, &fx.shop_b.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_level_writes_difference_only() {
        let fx = fixture().await;
        let p = product(&fx.db, "GARAM-1", 300, true).await;
        let ledger = fx.db.ledger();
        stock_up(&fx.db, &p.id, &fx.shop_a.id, 10).await;

        ledger.set_level(&p.id, &fx.shop_a.id, 7, "u-owner", None).await.unwrap();
        ledger.set_level(&p.id, &fx.shop_a.id, 7, "u-owner", None).await.unwrap();

        let adjustments = ledger
            .movements(
                &Visibility::All,
                &MovementFilter {
                    product_id: Some(p.id.clone()),
                    movement_type: Some(MovementType::Adjustment),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].quantity, -3);
        assert_eq!(adjustments[0].reference, MovementReference::ManualAdjustment);
    }

    #[tokio::test]
    async fn test_void_and_adjustment_may_go_negative() {
        let fx = fixture().await;
        let p = product(&fx.db, "ROKOK-1", 2_500, true).await;
        let ledger = fx.db.ledger();

        let record = ledger
            .adjust(StockAdjustment {
                movement_type: MovementType::Void,
                ..sale(&p.id, &fx.shop_a.id, 2)
            })
            .await
            .unwrap();
        assert_eq!(record.stock, -2);
    }

    #[tokio::test]
    async fn test_zero_quantity_and_unknown_product() {
        let fx = fixture().await;
        let p = product(&fx.db, "KECAP-1", 700, true).await;
        let ledger = fx.db.ledger();

        let zero = ledger.adjust(sale(&p.id, &fx.shop_a.id, 0)).await.unwrap_err();
        assert_eq!(zero.code(), ErrorCode::ValidationError);

        assert_eq!(ledger.get_stock(&p.id, &fx.shop_b.id).await.unwrap(), 0);
        let missing = ledger.get_stock("missing", &fx.shop_a.id).await.unwrap_err();
        assert_eq!(missing.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_low_stock_respects_visibility() {
        let fx = fixture().await;
        let p = product(&fx.db, "SABUN-1", 450, true).await;
        let ledger = fx.db.ledger();

        stock_up(&fx.db, &p.id, &fx.shop_a.id, 2).await;
        stock_up(&fx.db, &p.id, &fx.shop_b.id, 1).await;
        ledger.set_min_stock(&p.id, &fx.shop_a.id, 5).await.unwrap();
        ledger.set_min_stock(&p.id, &fx.shop_b.id, 5).await.unwrap();

        assert_eq!(ledger.low_stock(&Visibility::All).await.unwrap().len(), 2);
        let visible = ledger.low_stock(&fx.cashier.visibility).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].shop_id, fx.shop_a.id);
        assert!(visible[0].is_low());

        let nobody = Visibility::shops(Vec::<String>::new());
        assert!(ledger.low_stock(&nobody).await.unwrap().is_empty());
    }
}

//! # Purchase Order Engine
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► draft ──mark_ordered──► ordered ──receive──► partial ─┐    │
//! │               │  ▲                      │          │         │ ▲  │    │
//! │   update_draft┘  │                      │          │ receive └─┘  │    │
//! │               │                         │          ▼              │    │
//! │               │                         │       received ◄────────┘    │
//! │               ▼                         ▼          (all lines full)    │
//! │            canceled ◄──────cancel───────┴── (partial too)              │
//! │                                                                         │
//! │   delete: draft or canceled only                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Receiving records the cumulative quantity per line. Only the increase
//! over what was already received moves stock, as a `purchase` movement
//! referencing the order, and the product's purchase price becomes the
//! line's unit price.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use kasir_core::access::ensure_shop_access;
use kasir_core::invoice::{po_number, PURCHASE_ORDER_SCOPE};
use kasir_core::purchase::{line_subtotal, receive_delta, status_after_receipt};
use kasir_core::stock::StockKey;
use kasir_core::validation::{
    validate_line_count, validate_notes, validate_required, within_money_limit,
};
use kasir_core::{
    new_id, Actor, CoreError, Money, MovementReference, MovementType, PurchaseOrder,
    PurchaseOrderDetail, PurchaseOrderItem, PurchaseOrderStatus, ValidationError, Visibility,
};

use crate::engine::error::EngineResult;
use crate::engine::ledger::{apply_adjustment, StockAdjustment};
use crate::engine::{purchase_order_lock, EngineContext};
use crate::repository::product::{fetch_product, update_purchase_price};
use crate::repository::purchase_order::{
    delete_items, delete_order, fetch_items, fetch_list, fetch_order, insert_item, insert_order,
    update_header, update_received, update_status,
};
use crate::repository::sequence::next_value;
use crate::repository::shop::fetch_shop;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub shop_id: String,
    pub items: Vec<NewPurchaseOrderItem>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Cumulative quantity received so far on one line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub item_id: String,
    pub received_quantity: i64,
}

impl NewPurchaseOrder {
    /// Validates the request and returns each line's subtotal.
    fn validate(&self) -> EngineResult<Vec<Money>> {
        validate_required("supplier_id", &self.supplier_id)?;
        validate_required("shop_id", &self.shop_id)?;
        validate_line_count("items", self.items.len())?;
        validate_notes(self.notes.as_deref())?;

        let mut subtotals = Vec::with_capacity(self.items.len());
        for item in &self.items {
            validate_required("product_id", &item.product_id)?;
            subtotals.push(line_subtotal(item.quantity, item.unit_price)?);
        }
        within_money_limit("total", Money::checked_sum(&subtotals))?;
        Ok(subtotals)
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct PurchaseOrderEngine {
    ctx: EngineContext,
}

impl PurchaseOrderEngine {
    pub(crate) fn new(ctx: EngineContext) -> Self {
        PurchaseOrderEngine { ctx }
    }

    /// Creates a draft order with the next `PO-` number.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, shop_id = %request.shop_id))]
    pub async fn create(&self, actor: &Actor, request: NewPurchaseOrder) -> EngineResult<PurchaseOrderDetail> {
        ensure_shop_access(actor, &request.shop_id)?;
        let subtotals = request.validate()?;

        let mut tx = self.ctx.begin().await?;
        check_references(&mut tx, &request).await?;

        let now = Utc::now();
        let sequence = next_value(&mut tx, PURCHASE_ORDER_SCOPE).await?;
        let order = PurchaseOrder {
            id: new_id(),
            po_number: po_number(sequence),
            supplier_id: request.supplier_id.clone(),
            shop_id: request.shop_id.clone(),
            status: PurchaseOrderStatus::Draft,
            total: subtotals.iter().sum(),
            notes: request.notes.clone(),
            created_by: actor.user_id.clone(),
            received_by: None,
            created_at: now,
            updated_at: now,
        };
        insert_order(&mut tx, &order).await?;
        let items = insert_lines(&mut tx, &order.id, &request, &subtotals).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, total = %order.total, lines = items.len(), "Purchase order created");
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Replaces the supplier, shop, notes and every line of a draft.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn update_draft(
        &self,
        actor: &Actor,
        id: &str,
        request: NewPurchaseOrder,
    ) -> EngineResult<PurchaseOrderDetail> {
        ensure_shop_access(actor, &request.shop_id)?;
        let subtotals = request.validate()?;

        let _locks = self.ctx.lock([purchase_order_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let order = load_order(&mut tx, actor, id).await?;
        if !order.status.can_edit() {
            return Err(CoreError::invalid_state("PurchaseOrder", &order.po_number, order.status, "be edited").into());
        }
        check_references(&mut tx, &request).await?;

        let order = PurchaseOrder {
            supplier_id: request.supplier_id.clone(),
            shop_id: request.shop_id.clone(),
            total: subtotals.iter().sum(),
            notes: request.notes.clone(),
            updated_at: Utc::now(),
            ..order
        };
        delete_items(&mut tx, &order.id).await?;
        let items = insert_lines(&mut tx, &order.id, &request, &subtotals).await?;
        update_header(&mut tx, &order).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, "Purchase order draft updated");
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Sends a draft to the supplier: draft → ordered.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn mark_ordered(&self, actor: &Actor, id: &str) -> EngineResult<PurchaseOrderDetail> {
        let _locks = self.ctx.lock([purchase_order_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let order = load_order(&mut tx, actor, id).await?;
        if !order.status.can_order() {
            return Err(CoreError::invalid_state("PurchaseOrder", &order.po_number, order.status, "be ordered").into());
        }
        let items = fetch_items(&mut *tx, &order.id).await?;
        validate_line_count("items", items.len())?;

        let now = Utc::now();
        update_status(&mut tx, &order.id, PurchaseOrderStatus::Ordered, None, now).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, "Purchase order marked ordered");
        Ok(PurchaseOrderDetail {
            order: PurchaseOrder {
                status: PurchaseOrderStatus::Ordered,
                updated_at: now,
                ..order
            },
            items,
        })
    }

    /// Records received quantities and books the increase into stock.
    ///
    /// ## Errors
    /// - `InvalidState` unless the order is ordered or partial
    /// - `ValidationError` for a line of another order or a quantity
    ///   outside `0..=ordered`
    #[instrument(skip(self, actor, lines), fields(user_id = %actor.user_id))]
    pub async fn receive(
        &self,
        actor: &Actor,
        id: &str,
        lines: Vec<ReceiveLine>,
    ) -> EngineResult<PurchaseOrderDetail> {
        validate_line_count("lines", lines.len())?;

        // Stock keys come from the lines, so read them before locking.
        let (shop_id, product_ids) = {
            let mut conn = self.ctx.pool.acquire().await?;
            let order = fetch_order(&mut *conn, id)
                .await?
                .ok_or_else(|| CoreError::not_found("PurchaseOrder", id))?;
            let items = fetch_items(&mut *conn, id).await?;
            (order.shop_id, items.into_iter().map(|i| i.product_id).collect::<Vec<_>>())
        };
        ensure_shop_access(actor, &shop_id)?;

        let keys = std::iter::once(purchase_order_lock(id)).chain(
            product_ids
                .iter()
                .map(|product_id| StockKey::new(product_id, &shop_id).to_string()),
        );
        let _locks = self.ctx.lock(keys).await?;
        let mut tx = self.ctx.begin().await?;

        let order = load_order(&mut tx, actor, id).await?;
        if !order.status.can_receive() {
            return Err(CoreError::invalid_state("PurchaseOrder", &order.po_number, order.status, "receive goods").into());
        }

        let mut items = fetch_items(&mut *tx, &order.id).await?;
        let positions: HashMap<String, usize> =
            items.iter().enumerate().map(|(i, item)| (item.id.clone(), i)).collect();

        let now = Utc::now();
        let mut received_any = false;
        for line in &lines {
            let Some(&position) = positions.get(&line.item_id) else {
                return Err(ValidationError::invalid(
                    "item_id",
                    format!("item {} does not belong to {}", line.item_id, order.po_number),
                )
                .into());
            };
            let item = &mut items[position];
            let additional = receive_delta(item, line.received_quantity)?;
            if additional <= 0 {
                debug!(item_id = %item.id, additional, "Nothing new received on line");
                continue;
            }

            update_received(&mut tx, &item.id, line.received_quantity).await?;
            item.received_quantity = line.received_quantity;
            received_any = true;

            let product = fetch_product(&mut *tx, &item.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Product", &item.product_id))?;
            if product.uses_stock {
                let adjustment = StockAdjustment {
                    product_id: product.id.clone(),
                    shop_id: order.shop_id.clone(),
                    quantity: additional,
                    movement_type: MovementType::Purchase,
                    reference: MovementReference::PurchaseOrder {
                        id: order.id.clone(),
                    },
                    user_id: actor.user_id.clone(),
                    notes: Some(format!("Received from PO: {}", order.po_number)),
                };
                apply_adjustment(&mut tx, &adjustment, None).await?;
            }
            update_purchase_price(&mut tx, &product.id, item.unit_price, now).await?;
        }

        let status = status_after_receipt(order.status, &items);
        let order = if received_any {
            update_status(&mut tx, &order.id, status, Some(actor.user_id.as_str()), now).await?;
            PurchaseOrder {
                status,
                received_by: order.received_by.clone().or_else(|| Some(actor.user_id.clone())),
                updated_at: now,
                ..order
            }
        } else {
            order
        };
        tx.commit().await?;

        info!(po_number = %order.po_number, status = %order.status, "Purchase order receipt recorded");
        Ok(PurchaseOrderDetail { order, items })
    }

    /// draft | ordered | partial → canceled. Received stock stays.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cancel(&self, actor: &Actor, id: &str) -> EngineResult<PurchaseOrder> {
        let _locks = self.ctx.lock([purchase_order_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let order = load_order(&mut tx, actor, id).await?;
        if !order.status.can_cancel() {
            return Err(CoreError::invalid_state("PurchaseOrder", &order.po_number, order.status, "be canceled").into());
        }
        let now = Utc::now();
        update_status(&mut tx, &order.id, PurchaseOrderStatus::Canceled, None, now).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, "Purchase order canceled");
        Ok(PurchaseOrder {
            status: PurchaseOrderStatus::Canceled,
            updated_at: now,
            ..order
        })
    }

    /// Removes a draft or canceled order with its lines.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn delete(&self, actor: &Actor, id: &str) -> EngineResult<()> {
        let _locks = self.ctx.lock([purchase_order_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let order = load_order(&mut tx, actor, id).await?;
        if !order.status.can_delete() {
            return Err(CoreError::invalid_state("PurchaseOrder", &order.po_number, order.status, "be deleted").into());
        }
        delete_order(&mut tx, &order.id).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, "Purchase order deleted");
        Ok(())
    }

    /// An order with its lines, if the actor can see its shop.
    pub async fn get(&self, actor: &Actor, id: &str) -> EngineResult<PurchaseOrderDetail> {
        let mut conn = self.ctx.pool.acquire().await?;
        let order = load_order(&mut conn, actor, id).await?;
        let items = fetch_items(&mut *conn, id).await?;
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Orders in the visible shops, newest first.
    pub async fn list(
        &self,
        visibility: &Visibility,
        status: Option<PurchaseOrderStatus>,
    ) -> EngineResult<Vec<PurchaseOrder>> {
        Ok(fetch_list(&self.ctx.pool, visibility, status).await?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_order(conn: &mut SqliteConnection, actor: &Actor, id: &str) -> EngineResult<PurchaseOrder> {
    let order = fetch_order(&mut *conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("PurchaseOrder", id))?;
    ensure_shop_access(actor, &order.shop_id)?;
    Ok(order)
}

async fn check_references(conn: &mut SqliteConnection, request: &NewPurchaseOrder) -> EngineResult<()> {
    if fetch_shop(&mut *conn, &request.shop_id).await?.is_none() {
        return Err(CoreError::not_found("Shop", &request.shop_id).into());
    }
    for item in &request.items {
        if fetch_product(&mut *conn, &item.product_id).await?.is_none() {
            return Err(CoreError::not_found("Product", &item.product_id).into());
        }
    }
    Ok(())
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
    request: &NewPurchaseOrder,
    subtotals: &[Money],
) -> EngineResult<Vec<PurchaseOrderItem>> {
    let mut items = Vec::with_capacity(request.items.len());
    for (line, subtotal) in request.items.iter().zip(subtotals) {
        let item = PurchaseOrderItem {
            id: new_id(),
            purchase_order_id: order_id.to_string(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            received_quantity: 0,
            unit_price: line.unit_price,
            subtotal: *subtotal,
        };
        insert_item(&mut *conn, &item).await?;
        items.push(item);
    }
    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::ErrorCode;
    use crate::repository::stock::MovementFilter;
    use crate::testing::{fixture, product, Fixture};
    use kasir_core::Product;

    fn order_of(fx: &Fixture, lines: &[(&Product, i64, i64)]) -> NewPurchaseOrder {
        NewPurchaseOrder {
            supplier_id: "sup-1".into(),
            shop_id: fx.shop_a.id.clone(),
            items: lines
                .iter()
                .map(|(p, quantity, price)| NewPurchaseOrderItem {
                    product_id: p.id.clone(),
                    quantity: *quantity,
                    unit_price: Money::from_cents(*price),
                })
                .collect(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_numbers_and_totals() {
        let fx = fixture().await;
        let a = product(&fx.db, "BERAS-5", 65_000, true).await;
        let engine = fx.db.purchase_orders();

        let first = engine.create(&fx.owner, order_of(&fx, &[(&a, 10, 60_000)])).await.unwrap();
        let second = engine.create(&fx.owner, order_of(&fx, &[(&a, 2, 61_000)])).await.unwrap();

        assert_eq!(first.order.po_number, "PO-00000001");
        assert_eq!(second.order.po_number, "PO-00000002");
        assert_eq!(first.order.status, PurchaseOrderStatus::Draft);
        assert_eq!(first.order.total.cents(), 600_000);
        assert_eq!(first.items[0].subtotal.cents(), 600_000);
    }

    #[tokio::test]
    async fn test_partial_then_full_receipt() {
        let fx = fixture().await;
        let a = product(&fx.db, "KOPI-A", 5_000, true).await;
        let b = product(&fx.db, "KOPI-B", 7_000, true).await;
        let engine = fx.db.purchase_orders();

        let po = engine
            .create(&fx.owner, order_of(&fx, &[(&a, 10, 3_000), (&b, 5, 4_000)]))
            .await
            .unwrap();
        engine.mark_ordered(&fx.owner, &po.order.id).await.unwrap();

        let lines = |qa: i64, qb: i64| {
            vec![
                ReceiveLine { item_id: po.items[0].id.clone(), received_quantity: qa },
                ReceiveLine { item_id: po.items[1].id.clone(), received_quantity: qb },
            ]
        };

        let partial = engine.receive(&fx.cashier, &po.order.id, lines(6, 5)).await.unwrap();
        assert_eq!(partial.order.status, PurchaseOrderStatus::Partial);
        assert_eq!(partial.order.received_by.as_deref(), Some("u-cashier"));

        let ledger = fx.db.ledger();
        assert_eq!(ledger.get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 6);
        assert_eq!(ledger.get_stock(&b.id, &fx.shop_a.id).await.unwrap(), 5);
        let repriced = fx.db.products().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(repriced.purchase_price.cents(), 3_000);

        let full = engine.receive(&fx.owner, &po.order.id, lines(10, 5)).await.unwrap();
        assert_eq!(full.order.status, PurchaseOrderStatus::Received);
        assert_eq!(full.order.received_by.as_deref(), Some("u-cashier"));
        assert_eq!(ledger.get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 10);

        let purchases = ledger
            .movements(
                &Visibility::All,
                &MovementFilter {
                    product_id: Some(a.id.clone()),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(purchases.iter().map(|m| m.quantity).collect::<Vec<_>>(), vec![6, 4]);
        assert_eq!(
            purchases[0].notes.as_deref(),
            Some(format!("Received from PO: {}", po.order.po_number).as_str())
        );

        let again = engine.receive(&fx.owner, &po.order.id, lines(10, 5)).await.unwrap_err();
        assert_eq!(again.code(), ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_receive_rejections_write_nothing() {
        let fx = fixture().await;
        let a = product(&fx.db, "GULA-1", 1_500, true).await;
        let engine = fx.db.purchase_orders();
        let po = engine.create(&fx.owner, order_of(&fx, &[(&a, 10, 1_200)])).await.unwrap();
        let line = |q: i64| vec![ReceiveLine { item_id: po.items[0].id.clone(), received_quantity: q }];

        let draft = engine.receive(&fx.owner, &po.order.id, line(1)).await.unwrap_err();
        assert_eq!(draft.code(), ErrorCode::InvalidState);

        engine.mark_ordered(&fx.owner, &po.order.id).await.unwrap();
        let over = engine.receive(&fx.owner, &po.order.id, line(11)).await.unwrap_err();
        assert_eq!(over.code(), ErrorCode::ValidationError);

        let stranger = vec![ReceiveLine { item_id: "other".into(), received_quantity: 1 }];
        let foreign = engine.receive(&fx.owner, &po.order.id, stranger).await.unwrap_err();
        assert_eq!(foreign.code(), ErrorCode::ValidationError);

        assert_eq!(fx.db.ledger().get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 0);
        let stored = engine.get(&fx.owner, &po.order.id).await.unwrap();
        assert_eq!(stored.order.status, PurchaseOrderStatus::Ordered);
        assert_eq!(stored.items[0].received_quantity, 0);
    }

    #[tokio::test]
    async fn test_untracked_product_only_reprices() {
        let fx = fixture().await;
        let service = product(&fx.db, "JASA-1", 10_000, false).await;
        let engine = fx.db.purchase_orders();
        let po = engine.create(&fx.owner, order_of(&fx, &[(&service, 1, 8_000)])).await.unwrap();
        engine.mark_ordered(&fx.owner, &po.order.id).await.unwrap();

        let done = engine
            .receive(
                &fx.owner,
                &po.order.id,
                vec![ReceiveLine { item_id: po.items[0].id.clone(), received_quantity: 1 }],
            )
            .await
            .unwrap();
        assert_eq!(done.order.status, PurchaseOrderStatus::Received);
        assert_eq!(fx.db.ledger().movement_total(&service.id, &fx.shop_a.id).await.unwrap(), 0);
        let repriced = fx.db.products().get_by_id(&service.id).await.unwrap().unwrap();
        assert_eq!(repriced.purchase_price.cents(), 8_000);
    }

    #[tokio::test]
    async fn test_draft_editing_and_state_rules() {
        let fx = fixture().await;
        let a = product(&fx.db, "TEH-1", 400, true).await;
        let b = product(&fx.db, "TEH-2", 450, true).await;
        let engine = fx.db.purchase_orders();

        let po = engine.create(&fx.owner, order_of(&fx, &[(&a, 10, 300)])).await.unwrap();
        let edited = engine
            .update_draft(&fx.owner, &po.order.id, order_of(&fx, &[(&a, 5, 300), (&b, 5, 350)]))
            .await
            .unwrap();
        assert_eq!(edited.items.len(), 2);
        assert_eq!(edited.order.total.cents(), 3_250);
        assert_eq!(engine.get(&fx.owner, &po.order.id).await.unwrap().items.len(), 2);

        engine.mark_ordered(&fx.owner, &po.order.id).await.unwrap();
        let late = engine
            .update_draft(&fx.owner, &po.order.id, order_of(&fx, &[(&a, 1, 300)]))
            .await
            .unwrap_err();
        assert_eq!(late.code(), ErrorCode::InvalidState);

        let busy = engine.delete(&fx.owner, &po.order.id).await.unwrap_err();
        assert_eq!(busy.code(), ErrorCode::InvalidState);

        let canceled = engine.cancel(&fx.owner, &po.order.id).await.unwrap();
        assert_eq!(canceled.status, PurchaseOrderStatus::Canceled);
        assert_eq!(
            engine.cancel(&fx.owner, &po.order.id).await.unwrap_err().code(),
            ErrorCode::InvalidState
        );

        engine.delete(&fx.owner, &po.order.id).await.unwrap();
        assert_eq!(engine.get(&fx.owner, &po.order.id).await.unwrap_err().code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_visibility() {
        let fx = fixture().await;
        let a = product(&fx.db, "TEH-3", 400, true).await;
        let engine = fx.db.purchase_orders();

        let mut other = order_of(&fx, &[(&a, 1, 300)]);
        other.shop_id = fx.shop_b.id.clone();
        let denied = engine.create(&fx.cashier, other.clone()).await.unwrap_err();
        assert_eq!(denied.code(), ErrorCode::AccessDenied);

        let foreign = engine.create(&fx.owner, other).await.unwrap();
        let own = engine.create(&fx.cashier, order_of(&fx, &[(&a, 1, 300)])).await.unwrap();

        let hidden = engine.get(&fx.cashier, &foreign.order.id).await.unwrap_err();
        assert_eq!(hidden.code(), ErrorCode::AccessDenied);
        assert_eq!(engine.get(&fx.cashier, &own.order.id).await.unwrap().items.len(), 1);
        assert_eq!(engine.get(&fx.owner, &foreign.order.id).await.unwrap().order.shop_id, fx.shop_b.id);

        assert_eq!(engine.list(&Visibility::All, None).await.unwrap().len(), 2);
        assert_eq!(engine.list(&fx.cashier.visibility, None).await.unwrap().len(), 1);
        assert_eq!(
            engine
                .list(&Visibility::All, Some(PurchaseOrderStatus::Ordered))
                .await
                .unwrap()
                .len(),
            0
        );
    }
}

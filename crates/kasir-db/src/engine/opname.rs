//! # Stock Opname Engine
//!
//! Physical stock counts and their reconciliation into the ledger.
//!
//! ## Lifecycle
//! ```text
//! create ──► draft ──submit──► pending ──approve──► approved
//!            │  ▲                │
//!            └──┘ update_draft   │
//!            │                   │
//!            └──cancel──► canceled ◄──cancel
//!
//! delete: draft | canceled
//! ```
//!
//! Each line snapshots the system stock when it is recorded. Approval
//! overwrites the live level with the counted one; the movement carries the
//! delta actually applied, which differs from the recorded variance when
//! stock moved between count and approval.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use kasir_core::access::ensure_shop_access;
use kasir_core::opname::{approval_delta, select_for_approval, variance};
use kasir_core::stock::StockKey;
use kasir_core::validation::{validate_line_count, validate_notes, validate_required};
use kasir_core::{
    new_id, Actor, CoreError, MovementReference, MovementType, OpnameStatus, StockOpname,
    StockOpnameDetail, StockOpnameItem, ValidationError, Visibility,
};

use crate::engine::error::EngineResult;
use crate::engine::ledger::{apply_adjustment, StockAdjustment};
use crate::engine::{opname_lock, EngineContext};
use crate::repository::opname::{
    delete_items, delete_opname, fetch_items, fetch_list, fetch_opname, insert_item,
    insert_opname, mark_approved, update_header, update_status,
};
use crate::repository::product::fetch_product;
use crate::repository::shop::fetch_shop;
use crate::repository::stock::fetch_record;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStockOpname {
    pub shop_id: String,
    /// Defaults to now.
    pub opname_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<NewOpnameItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOpnameItem {
    pub product_id: String,
    pub physical_stock: i64,
    pub notes: Option<String>,
}

impl NewStockOpname {
    fn validate(&self) -> EngineResult<()> {
        validate_required("shop_id", &self.shop_id)?;
        validate_line_count("items", self.items.len())?;
        validate_notes(self.notes.as_deref())?;

        let mut seen = HashSet::new();
        for item in &self.items {
            validate_required("product_id", &item.product_id)?;
            validate_notes(item.notes.as_deref())?;
            variance(item.physical_stock, 0)?;
            if !seen.insert(item.product_id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "product_id".to_string(),
                    value: item.product_id.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StockOpnameEngine {
    ctx: EngineContext,
}

impl StockOpnameEngine {
    pub(crate) fn new(ctx: EngineContext) -> Self {
        StockOpnameEngine { ctx }
    }

    /// Records a count as a draft, snapshotting system stock per line.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, shop_id = %request.shop_id))]
    pub async fn create(&self, actor: &Actor, request: NewStockOpname) -> EngineResult<StockOpnameDetail> {
        ensure_shop_access(actor, &request.shop_id)?;
        request.validate()?;

        let mut tx = self.ctx.begin().await?;
        if fetch_shop(&mut *tx, &request.shop_id).await?.is_none() {
            return Err(CoreError::not_found("Shop", &request.shop_id).into());
        }

        let now = Utc::now();
        let opname = StockOpname {
            id: new_id(),
            shop_id: request.shop_id.clone(),
            status: OpnameStatus::Draft,
            conducted_by: actor.user_id.clone(),
            approved_by: None,
            opname_date: request.opname_date.unwrap_or(now),
            notes: request.notes.clone(),
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        insert_opname(&mut tx, &opname).await?;
        let items = snapshot_lines(&mut tx, &opname, &request).await?;
        tx.commit().await?;

        info!(opname_id = %opname.id, lines = items.len(), "Stock opname created");
        Ok(StockOpnameDetail { opname, items })
    }

    /// Replaces the lines of a draft, taking fresh system snapshots.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn update_draft(
        &self,
        actor: &Actor,
        id: &str,
        request: NewStockOpname,
    ) -> EngineResult<StockOpnameDetail> {
        request.validate()?;

        let _locks = self.ctx.lock([opname_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let opname = load_opname(&mut tx, actor, id).await?;
        if !opname.status.can_edit() {
            return Err(CoreError::invalid_state("StockOpname", id, opname.status, "be edited").into());
        }
        if request.shop_id != opname.shop_id {
            return Err(ValidationError::invalid("shop_id", "a stock opname cannot move to another shop").into());
        }

        let opname = StockOpname {
            opname_date: request.opname_date.unwrap_or(opname.opname_date),
            notes: request.notes.clone(),
            updated_at: Utc::now(),
            ..opname
        };
        delete_items(&mut tx, &opname.id).await?;
        let items = snapshot_lines(&mut tx, &opname, &request).await?;
        update_header(&mut tx, &opname).await?;
        tx.commit().await?;

        info!(opname_id = %opname.id, lines = items.len(), "Stock opname draft updated");
        Ok(StockOpnameDetail { opname, items })
    }

    /// draft → pending.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn submit(&self, actor: &Actor, id: &str) -> EngineResult<StockOpname> {
        self.transition(actor, id, OpnameStatus::Pending).await
    }

    /// draft | pending → canceled.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cancel(&self, actor: &Actor, id: &str) -> EngineResult<StockOpname> {
        self.transition(actor, id, OpnameStatus::Canceled).await
    }

    /// Applies counted stock for the selected lines (all when `None`).
    ///
    /// Lines with zero variance are skipped. Each applied line overwrites the
    /// live level with `physical_stock` and writes one `adjustment` movement
    /// referencing the opname.
    ///
    /// ## Errors
    /// - `InvalidState` unless the opname is pending (a second approval fails)
    /// - `ValidationError` when a selected id is not a line of this opname
    #[instrument(skip(self, actor, selected), fields(user_id = %actor.user_id))]
    pub async fn approve(
        &self,
        actor: &Actor,
        id: &str,
        selected: Option<Vec<String>>,
    ) -> EngineResult<StockOpnameDetail> {
        // Stock keys come from the lines, so read them before locking.
        let (shop_id, product_ids) = {
            let mut conn = self.ctx.pool.acquire().await?;
            let opname = fetch_opname(&mut *conn, id)
                .await?
                .ok_or_else(|| CoreError::not_found("StockOpname", id))?;
            let items = fetch_items(&mut *conn, id).await?;
            (opname.shop_id, items.into_iter().map(|i| i.product_id).collect::<Vec<_>>())
        };
        ensure_shop_access(actor, &shop_id)?;

        let keys = std::iter::once(opname_lock(id)).chain(
            product_ids
                .iter()
                .map(|product_id| StockKey::new(product_id, &shop_id).to_string()),
        );
        let _locks = self.ctx.lock(keys).await?;
        let mut tx = self.ctx.begin().await?;

        let opname = load_opname(&mut tx, actor, id).await?;
        if !opname.status.can_approve() {
            return Err(CoreError::invalid_state("StockOpname", id, opname.status, "be approved").into());
        }

        let items = fetch_items(&mut *tx, &opname.id).await?;
        let chosen = select_for_approval(&items, selected.as_deref())?;

        let mut applied = 0usize;
        for item in chosen.into_iter().filter(|i| i.variance != 0) {
            let current = fetch_record(&mut *tx, &item.product_id, &opname.shop_id)
                .await?
                .map_or(0, |r| r.stock);
            let delta = approval_delta(item, current);
            if delta == 0 {
                debug!(product_id = %item.product_id, "Stock already matches the count");
                continue;
            }

            let adjustment = StockAdjustment {
                product_id: item.product_id.clone(),
                shop_id: opname.shop_id.clone(),
                quantity: delta,
                movement_type: MovementType::Adjustment,
                reference: MovementReference::StockOpname {
                    id: opname.id.clone(),
                },
                user_id: actor.user_id.clone(),
                notes: Some(format!("Stock adjustment from stock opname #{}", opname.id)),
            };
            apply_adjustment(&mut tx, &adjustment, None).await?;
            applied += 1;
        }

        let now = Utc::now();
        mark_approved(&mut tx, &opname.id, &actor.user_id, now).await?;
        tx.commit().await?;

        info!(opname_id = %opname.id, applied, "Stock opname approved");
        Ok(StockOpnameDetail {
            opname: StockOpname {
                status: OpnameStatus::Approved,
                approved_by: Some(actor.user_id.clone()),
                approved_at: Some(now),
                updated_at: now,
                ..opname
            },
            items,
        })
    }

    /// Removes a draft or canceled opname with its lines.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn delete(&self, actor: &Actor, id: &str) -> EngineResult<()> {
        let _locks = self.ctx.lock([opname_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let opname = load_opname(&mut tx, actor, id).await?;
        if !opname.status.can_delete() {
            return Err(CoreError::invalid_state("StockOpname", id, opname.status, "be deleted").into());
        }
        delete_opname(&mut tx, &opname.id).await?;
        tx.commit().await?;

        info!(opname_id = %opname.id, "Stock opname deleted");
        Ok(())
    }

    pub async fn get(&self, actor: &Actor, id: &str) -> EngineResult<StockOpnameDetail> {
        let mut conn = self.ctx.pool.acquire().await?;
        let opname = load_opname(&mut conn, actor, id).await?;
        let items = fetch_items(&mut *conn, id).await?;
        Ok(StockOpnameDetail { opname, items })
    }

    pub async fn list(
        &self,
        visibility: &Visibility,
        status: Option<OpnameStatus>,
    ) -> EngineResult<Vec<StockOpname>> {
        Ok(fetch_list(&self.ctx.pool, visibility, status).await?)
    }

    async fn transition(&self, actor: &Actor, id: &str, to: OpnameStatus) -> EngineResult<StockOpname> {
        let _locks = self.ctx.lock([opname_lock(id)]).await?;
        let mut tx = self.ctx.begin().await?;

        let opname = load_opname(&mut tx, actor, id).await?;
        let (allowed, operation) = match to {
            OpnameStatus::Pending => (opname.status.can_submit(), "be submitted"),
            OpnameStatus::Canceled => (opname.status.can_cancel(), "be canceled"),
            OpnameStatus::Draft | OpnameStatus::Approved => (false, "change status"),
        };
        if !allowed {
            return Err(CoreError::invalid_state("StockOpname", id, opname.status, operation).into());
        }
        if to == OpnameStatus::Pending {
            let items = fetch_items(&mut *tx, &opname.id).await?;
            validate_line_count("items", items.len())?;
        }

        let now = Utc::now();
        update_status(&mut tx, &opname.id, to, now).await?;
        tx.commit().await?;

        info!(opname_id = %opname.id, from = %opname.status, to = %to, "Stock opname status changed");
        Ok(StockOpname {
            status: to,
            updated_at: now,
            ..opname
        })
    }
}

async fn load_opname(conn: &mut SqliteConnection, actor: &Actor, id: &str) -> EngineResult<StockOpname> {
    let opname = fetch_opname(&mut *conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("StockOpname", id))?;
    ensure_shop_access(actor, &opname.shop_id)?;
    Ok(opname)
}

/// Inserts the request's lines with the current system stock as snapshot.
async fn snapshot_lines(
    conn: &mut SqliteConnection,
    opname: &StockOpname,
    request: &NewStockOpname,
) -> EngineResult<Vec<StockOpnameItem>> {
    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        if fetch_product(&mut *conn, &line.product_id).await?.is_none() {
            return Err(CoreError::not_found("Product", &line.product_id).into());
        }
        let system_stock = fetch_record(&mut *conn, &line.product_id, &opname.shop_id)
            .await?
            .map_or(0, |r| r.stock);

        let item = StockOpnameItem {
            id: new_id(),
            stock_opname_id: opname.id.clone(),
            product_id: line.product_id.clone(),
            system_stock,
            physical_stock: line.physical_stock,
            variance: variance(line.physical_stock, system_stock)?,
            notes: line.notes.clone(),
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
    use crate::testing::{fixture, product, stock_up, Fixture};
    use kasir_core::Product;

    fn count_of(fx: &Fixture, lines: &[(&Product, i64)]) -> NewStockOpname {
        NewStockOpname {
            shop_id: fx.shop_a.id.clone(),
            opname_date: None,
            notes: Some("monthly count".into()),
            items: lines
                .iter()
                .map(|(p, physical)| NewOpnameItem {
                    product_id: p.id.clone(),
                    physical_stock: *physical,
                    notes: None,
                })
                .collect(),
        }
    }

    async fn adjustments(fx: &Fixture) -> Vec<kasir_core::StockMovement> {
        fx.db
            .ledger()
            .movements(
                &Visibility::All,
                &MovementFilter {
                    movement_type: Some(MovementType::Adjustment),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_snapshots_system_stock() {
        let fx = fixture().await;
        let a = product(&fx.db, "SABUN-1", 450, true).await;
        let b = product(&fx.db, "SABUN-2", 500, true).await;
        stock_up(&fx.db, &a.id, &fx.shop_a.id, 10).await;

        let draft = fx
            .db
            .stock_opnames()
            .create(&fx.cashier, count_of(&fx, &[(&a, 7), (&b, 2)]))
            .await
            .unwrap();

        assert_eq!(draft.opname.status, OpnameStatus::Draft);
        assert_eq!(draft.opname.conducted_by, "u-cashier");
        assert_eq!((draft.items[0].system_stock, draft.items[0].variance), (10, -3));
        assert_eq!((draft.items[1].system_stock, draft.items[1].variance), (0, 2));
    }

    #[tokio::test]
    async fn test_approve_applies_once() {
        let fx = fixture().await;
        let a = product(&fx.db, "SABUN-3", 450, true).await;
        stock_up(&fx.db, &a.id, &fx.shop_a.id, 10).await;
        let engine = fx.db.stock_opnames();

        let draft = engine.create(&fx.owner, count_of(&fx, &[(&a, 7)])).await.unwrap();
        let early = engine.approve(&fx.owner, &draft.opname.id, None).await.unwrap_err();
        assert_eq!(early.code(), ErrorCode::InvalidState);

        engine.submit(&fx.owner, &draft.opname.id).await.unwrap();
        let approved = engine.approve(&fx.owner, &draft.opname.id, None).await.unwrap();
        assert_eq!(approved.opname.status, OpnameStatus::Approved);
        assert_eq!(approved.opname.approved_by.as_deref(), Some("u-owner"));
        assert_eq!(fx.db.ledger().get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 7);

        let moves = adjustments(&fx).await;
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].quantity, -3);
        assert_eq!(
            moves[0].reference,
            MovementReference::StockOpname { id: draft.opname.id.clone() }
        );
        assert_eq!(
            moves[0].notes.as_deref(),
            Some(format!("Stock adjustment from stock opname #{}", draft.opname.id).as_str())
        );

        let again = engine.approve(&fx.owner, &draft.opname.id, None).await.unwrap_err();
        assert_eq!(again.code(), ErrorCode::InvalidState);
        assert_eq!(adjustments(&fx).await.len(), 1);
        assert_eq!(fx.db.ledger().get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_approve_selected_lines_only() {
        let fx = fixture().await;
        let a = product(&fx.db, "MIE-1", 350, true).await;
        let b = product(&fx.db, "MIE-2", 350, true).await;
        stock_up(&fx.db, &a.id, &fx.shop_a.id, 5).await;
        stock_up(&fx.db, &b.id, &fx.shop_a.id, 5).await;
        let engine = fx.db.stock_opnames();

        let draft = engine.create(&fx.owner, count_of(&fx, &[(&a, 4), (&b, 9)])).await.unwrap();
        engine.submit(&fx.owner, &draft.opname.id).await.unwrap();

        let bogus = engine
            .approve(&fx.owner, &draft.opname.id, Some(vec!["nope".into()]))
            .await
            .unwrap_err();
        assert_eq!(bogus.code(), ErrorCode::ValidationError);

        engine
            .approve(&fx.owner, &draft.opname.id, Some(vec![draft.items[1].id.clone()]))
            .await
            .unwrap();
        assert_eq!(fx.db.ledger().get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 5);
        assert_eq!(fx.db.ledger().get_stock(&b.id, &fx.shop_a.id).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_approve_overwrites_moved_stock() {
        let fx = fixture().await;
        let a = product(&fx.db, "KOPI-9", 5_000, true).await;
        stock_up(&fx.db, &a.id, &fx.shop_a.id, 10).await;
        let engine = fx.db.stock_opnames();

        let draft = engine.create(&fx.owner, count_of(&fx, &[(&a, 7)])).await.unwrap();
        engine.submit(&fx.owner, &draft.opname.id).await.unwrap();
        fx.db
            .ledger()
            .set_level(&a.id, &fx.shop_a.id, 8, "u-owner", None)
            .await
            .unwrap();

        engine.approve(&fx.owner, &draft.opname.id, None).await.unwrap();
        assert_eq!(fx.db.ledger().get_stock(&a.id, &fx.shop_a.id).await.unwrap(), 7);
        let moves = adjustments(&fx).await;
        assert_eq!(moves.last().unwrap().quantity, -1);
        assert_eq!(fx.db.ledger().movement_total(&a.id, &fx.shop_a.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_draft_rules() {
        let fx = fixture().await;
        let a = product(&fx.db, "GARAM-1", 300, true).await;
        stock_up(&fx.db, &a.id, &fx.shop_a.id, 3).await;
        let engine = fx.db.stock_opnames();

        let dup = engine
            .create(&fx.owner, count_of(&fx, &[(&a, 1), (&a, 2)]))
            .await
            .unwrap_err();
        assert_eq!(dup.code(), ErrorCode::ValidationError);
        let negative = engine.create(&fx.owner, count_of(&fx, &[(&a, -1)])).await.unwrap_err();
        assert_eq!(negative.code(), ErrorCode::ValidationError);

        let draft = engine.create(&fx.owner, count_of(&fx, &[(&a, 1)])).await.unwrap();
        stock_up(&fx.db, &a.id, &fx.shop_a.id, 2).await;
        let edited = engine
            .update_draft(&fx.owner, &draft.opname.id, count_of(&fx, &[(&a, 4)]))
            .await
            .unwrap();
        assert_eq!((edited.items[0].system_stock, edited.items[0].variance), (5, -1));

        engine.submit(&fx.owner, &draft.opname.id).await.unwrap();
        let late = engine
            .update_draft(&fx.owner, &draft.opname.id, count_of(&fx, &[(&a, 4)]))
            .await
            .unwrap_err();
        assert_eq!(late.code(), ErrorCode::InvalidState);
        assert_eq!(
            engine.delete(&fx.owner, &draft.opname.id).await.unwrap_err().code(),
            ErrorCode::InvalidState
        );

        engine.cancel(&fx.owner, &draft.opname.id).await.unwrap();
        engine.delete(&fx.owner, &draft.opname.id).await.unwrap();
        assert_eq!(
            engine.get(&fx.owner, &draft.opname.id).await.unwrap_err().code(),
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_other_shop_is_hidden_from_cashier() {
        let fx = fixture().await;
        let a = product(&fx.db, "GARAM-2", 300, true).await;
        let engine = fx.db.stock_opnames();

        let mut elsewhere = count_of(&fx, &[(&a, 1)]);
        elsewhere.shop_id = fx.shop_b.id.clone();
        let created = engine.create(&fx.owner, elsewhere).await.unwrap();

        let denied = engine.submit(&fx.cashier, &created.opname.id).await.unwrap_err();
        assert_eq!(denied.code(), ErrorCode::AccessDenied);
        let unreadable = engine.get(&fx.cashier, &created.opname.id).await.unwrap_err();
        assert_eq!(unreadable.code(), ErrorCode::AccessDenied);
        assert_eq!(engine.get(&fx.owner, &created.opname.id).await.unwrap().items.len(), 1);
        assert!(engine.list(&fx.cashier.visibility, None).await.unwrap().is_empty());
        assert_eq!(
            engine
                .list(&Visibility::All, Some(OpnameStatus::Draft))
                .await
                .unwrap()
                .len(),
            1
        );
    }
}

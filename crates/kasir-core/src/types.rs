//! # Domain Types
//!
//! Core domain types used throughout Kasir.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog             Stock                   Sales                      │
//! │  ───────             ─────                   ─────                      │
//! │  Shop                StockRecord             Transaction                │
//! │  Product             StockMovement           ├── TransactionItem        │
//! │  ├── PriceRule       ├── MovementType        └── TransactionPayment     │
//! │  └── WholesalePrice  └── MovementReference   Customer (points)          │
//! │                                                                         │
//! │  Procurement                    Reconciliation                          │
//! │  ───────────                    ──────────────                          │
//! │  PurchaseOrder                  StockOpname                             │
//! │  └── PurchaseOrderItem          └── StockOpnameItem                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (sku, invoice_number, po_number)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Shop & Customer
// =============================================================================

/// A sales location. Tenant boundary for stock and transactions.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A customer that can collect loyalty points.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Base unit price when no price rule matches.
    pub selling_price: Money,

    /// Latest cost basis; updated when purchase orders are received.
    pub purchase_price: Money,

    /// Whether stock levels are tracked for this product.
    pub uses_stock: bool,

    /// Inactive products cannot be sold.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker. Stock records and movements survive deletion.
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Active and not soft-deleted.
    pub fn is_sellable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// A tiered price for one price category.
///
/// `shop_id = None` applies to every shop; a shop-specific rule wins over a
/// global one when both match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PriceRule {
    pub id: String,
    pub product_id: String,
    pub shop_id: Option<String>,
    pub price_category_id: i64,
    pub min_quantity: i64,
    pub price: Money,
}

/// A quantity-break wholesale price, selected with the same tier logic as
/// [`PriceRule`] but independent of price categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WholesalePrice {
    pub id: String,
    pub product_id: String,
    pub shop_id: Option<String>,
    pub min_quantity: i64,
    pub price: Money,
    pub is_active: bool,
}

// =============================================================================
// Stock
// =============================================================================

/// Current stock of one product at one shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockRecord {
    pub id: String,
    pub product_id: String,
    pub shop_id: String,
    pub stock: i64,
    /// Reorder threshold.
    pub min_stock: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn is_low(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// Why a stock level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Return,
    Transfer,
    Void,
}

impl MovementType {
    /// Debits of these types may never take stock below zero.
    pub fn requires_non_negative(&self) -> bool {
        matches!(self, MovementType::Sale | MovementType::Transfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::Transfer => "transfer",
            MovementType::Void => "void",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity that caused a stock movement.
///
/// Persisted as a `(reference_type, reference_id)` column pair; resolving a
/// reference is an exhaustive `match`, never a string lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementReference {
    Transaction { id: String },
    PurchaseOrder { id: String },
    StockOpname { id: String },
    ManualAdjustment,
    /// Points at the paired movement on the other shop.
    Transfer { counterpart: String },
}

impl MovementReference {
    pub fn reference_type(&self) -> &'static str {
        match self {
            MovementReference::Transaction { .. } => "transaction",
            MovementReference::PurchaseOrder { .. } => "purchase_order",
            MovementReference::StockOpname { .. } => "stock_opname",
            MovementReference::ManualAdjustment => "manual_adjustment",
            MovementReference::Transfer { .. } => "transfer",
        }
    }

    pub fn reference_id(&self) -> Option<&str> {
        match self {
            MovementReference::Transaction { id }
            | MovementReference::PurchaseOrder { id }
            | MovementReference::StockOpname { id } => Some(id),
            MovementReference::ManualAdjustment => None,
            MovementReference::Transfer { counterpart } => Some(counterpart),
        }
    }

    /// Rebuilds a reference from its stored column pair.
    pub fn from_parts(
        reference_type: &str,
        reference_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        let id = || {
            reference_id
                .clone()
                .ok_or_else(|| ValidationError::required("reference_id"))
        };
        match reference_type {
            "transaction" => Ok(MovementReference::Transaction { id: id()? }),
            "purchase_order" => Ok(MovementReference::PurchaseOrder { id: id()? }),
            "stock_opname" => Ok(MovementReference::StockOpname { id: id()? }),
            "manual_adjustment" => Ok(MovementReference::ManualAdjustment),
            "transfer" => Ok(MovementReference::Transfer { counterpart: id()? }),
            other => Err(ValidationError::NotAllowed {
                field: format!("reference_type '{other}'"),
                allowed: [
                    "transaction",
                    "purchase_order",
                    "stock_opname",
                    "manual_adjustment",
                    "transfer",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            }),
        }
    }
}

/// One immutable audit row of a stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub shop_id: String,
    /// Signed: positive increases stock, negative decreases it.
    pub quantity: i64,
    pub movement_type: MovementType,
    pub reference: MovementReference,
    pub user_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Return,
    Adjustment,
}

impl TransactionType {
    /// The compensating type a void creates. Adjustments have none.
    pub fn reversal(&self) -> Option<TransactionType> {
        match self {
            TransactionType::Sale => Some(TransactionType::Return),
            TransactionType::Return => Some(TransactionType::Sale),
            TransactionType::Adjustment => None,
        }
    }

    pub fn movement_type(&self) -> MovementType {
        match self {
            TransactionType::Sale => MovementType::Sale,
            TransactionType::Return => MovementType::Return,
            TransactionType::Adjustment => MovementType::Adjustment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.movement_type().as_str()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of a transaction.
///
/// ```text
/// pending ──(0 < paid < total)──► partial ──(paid == total)──► completed
///    └───────────────(paid == total)──────────────────────────────┘
/// any of the above ──(void)──► refunded   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
    Refunded,
}

impl PaymentStatus {
    /// Only pending and partial transactions take more payments.
    pub fn accepts_payments(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sale, return or stock adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    /// `{SHOPCODE}-{YYYYMMDD}-{seq}`, or `VOID-{original}` for reversals.
    pub invoice_number: String,
    pub transaction_type: TransactionType,
    pub shop_id: String,
    pub customer_id: Option<String>,
    pub user_id: String,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub service_fee: Money,
    pub total_amount: Money,
    pub payment_method_id: String,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// Points awarded to the customer by this transaction.
    pub loyalty_points: i64,
    /// Set on reversal transactions: the id of the voided original.
    pub reversal_of: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A line item, frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub price_category_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    /// Cost basis at the time of the transaction (profit reporting).
    pub purchase_price: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub subtotal: Money,
}

/// One payment towards a transaction. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionPayment {
    pub id: String,
    pub transaction_id: String,
    pub payment_method_id: String,
    pub amount: Money,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
}

/// A transaction with its lines and payments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
    pub payments: Vec<TransactionPayment>,
}

impl TransactionDetail {
    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }
}

// =============================================================================
// Purchase Order
// =============================================================================

/// ```text
/// draft ──► ordered ──► partial ──► received
///   │          │           │
///   └──────────┴───────────┴──► canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Ordered,
    Partial,
    Received,
    Canceled,
}

impl PurchaseOrderStatus {
    pub fn can_edit(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }

    pub fn can_order(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }

    pub fn can_receive(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Partial)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Partial
        )
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft | PurchaseOrderStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::Partial => "partial",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    /// `PO-{8-digit sequence}`.
    pub po_number: String,
    pub supplier_id: String,
    pub shop_id: String,
    pub status: PurchaseOrderStatus,
    pub total: Money,
    pub notes: Option<String>,
    pub created_by: String,
    /// Set on the first receipt.
    pub received_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Always `0 ≤ received_quantity ≤ quantity`.
    pub received_quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl PurchaseOrderItem {
    pub fn is_complete(&self) -> bool {
        self.received_quantity >= self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderDetail {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

// =============================================================================
// Stock Opname
// =============================================================================

/// ```text
/// draft ──submit──► pending ──approve──► approved   (terminal, mutates stock)
///   │                  │
///   └──────────────────┴──cancel──► canceled        (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OpnameStatus {
    Draft,
    Pending,
    Approved,
    Canceled,
}

impl OpnameStatus {
    pub fn can_edit(&self) -> bool {
        matches!(self, OpnameStatus::Draft)
    }

    pub fn can_submit(&self) -> bool {
        matches!(self, OpnameStatus::Draft)
    }

    pub fn can_approve(&self) -> bool {
        matches!(self, OpnameStatus::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OpnameStatus::Draft | OpnameStatus::Pending)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, OpnameStatus::Draft | OpnameStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpnameStatus::Draft => "draft",
            OpnameStatus::Pending => "pending",
            OpnameStatus::Approved => "approved",
            OpnameStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OpnameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockOpname {
    pub id: String,
    pub shop_id: String,
    pub status: OpnameStatus,
    pub conducted_by: String,
    pub approved_by: Option<String>,
    #[ts(as = "String")]
    pub opname_date: DateTime<Utc>,
    pub notes: Option<String>,
    #[ts(as = "Option<String>")]
    pub approved_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockOpnameItem {
    pub id: String,
    pub stock_opname_id: String,
    pub product_id: String,
    /// Stock at the moment the line was recorded.
    pub system_stock: i64,
    pub physical_stock: i64,
    /// `physical_stock - system_stock`.
    pub variance: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockOpnameDetail {
    pub opname: StockOpname,
    pub items: Vec<StockOpnameItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

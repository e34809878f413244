use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::outbox::DomainEvent;
use super::value_objects::{Currency, OrderState};

// ============================================================================
// Order Events - Buffered Facts Dispatched After Commit
// ============================================================================
//
// The aggregate appends these while handling an operation; the persistence
// layer drains and publishes them strictly after its transaction commits.
// Subscribers (inventory engine, payment workers, mailers) receive them
// at-least-once and must tolerate duplicates.
//
// ============================================================================

/// Order Event - union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    Advanced(OrderAdvanced),
    Canceled(OrderCanceled),
    FinalizeInventory(InventoryFinalization),
    ReleaseInventory(InventoryRelease),
    PromotionApplied(OrderPromotionApplied),
    PromotionRemoved(OrderPromotionRemoved),
    PaymentAdded(OrderPaymentAdded),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "OrderCreated",
            Self::Advanced(_) => "OrderAdvanced",
            Self::Canceled(_) => "OrderCanceled",
            Self::FinalizeInventory(_) => "FinalizeInventory",
            Self::ReleaseInventory(_) => "ReleaseInventory",
            Self::PromotionApplied(_) => "OrderPromotionApplied",
            Self::PromotionRemoved(_) => "OrderPromotionRemoved",
            Self::PaymentAdded(_) => "OrderPaymentAdded",
        }
    }
}

// ============================================================================
// Stock Movement Vocabulary
// ============================================================================

/// The business event behind a stock-quantity change, as a tagged union so
/// the inventory engine never dereferences a nullable foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum StockOriginator {
    Order(Uuid),
    Transfer(Uuid),
    SupplierReceipt(Uuid),
    Adjustment,
}

/// One variant/quantity pair inside an inventory request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub variant_id: Uuid,
    pub quantity: u32,
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Initial event in the order lifecycle.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub store_id: Uuid,
    pub currency: Currency,
    pub number: String,
}

/// The order stepped forward through the checkout sequence.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderAdvanced {
    pub from: OrderState,
    pub to: OrderState,
}

/// The order was canceled before completion.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCanceled {
    pub canceled_at: DateTime<Utc>,
}

/// Tells the inventory engine to convert the order's reservations into
/// permanent decrements. Raised exactly once, on Confirm -> Complete.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InventoryFinalization {
    pub originator: StockOriginator,
    pub lines: Vec<StockLine>,
    pub completed_at: DateTime<Utc>,
}

/// Tells the inventory engine to release the order's reservations.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InventoryRelease {
    pub originator: StockOriginator,
    pub lines: Vec<StockLine>,
}

/// A promotion was attached and its adjustments materialized.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPromotionApplied {
    pub promotion_id: Uuid,
    pub code: Option<String>,
}

/// The active promotion and every adjustment it produced were removed.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPromotionRemoved {
    pub promotion_id: Uuid,
}

/// A funding attempt was attached to the order.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPaymentAdded {
    pub payment_id: Uuid,
    pub amount_cents: i64,
}

// ============================================================================
// Unit Tests
// ============================================================================

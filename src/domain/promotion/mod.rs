use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Promotion Contracts - Opaque Discount Descriptors
// ============================================================================
//
// Eligibility rules are evaluated by the promotion engine before a
// descriptor ever reaches the order core. The core only materializes the
// declared actions into adjustments and keeps the bookkeeping straight.
//
// ============================================================================

/// One discount effect a promotion declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PromotionAction {
    /// Fixed credit against the whole order, in cents.
    OrderDiscount { amount_cents: i64 },
    /// Percent taken off each line item subtotal (floor division).
    LineItemDiscount { percent: u32 },
}

/// Promotion descriptor handed to `Order::apply_promotion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub actions: Vec<PromotionAction>,
}

impl Promotion {
    pub fn new(name: impl Into<String>, actions: Vec<PromotionAction>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code: None,
            actions,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

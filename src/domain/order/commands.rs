use uuid::Uuid;

use crate::domain::catalog::{ShippingMethod, Variant};
use crate::domain::promotion::Promotion;
use super::value_objects::Address;

// ============================================================================
// Order Commands - Represent Caller Intent
// ============================================================================
//
// Collaborator snapshots (variant, shipping method, promotion) are resolved
// by the application service before the command reaches the handler; the
// order core never queries the catalog itself.
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    AddLineItem {
        variant: Variant,
        quantity: u32,
    },
    RemoveLineItem {
        line_item_id: Uuid,
    },
    UpdateLineItemQuantity {
        line_item_id: Uuid,
        quantity: u32,
    },
    ApplyPromotion {
        promotion: Promotion,
        code: Option<String>,
    },
    RemovePromotion,
    SetShippingAddress {
        address: Address,
    },
    SetBillingAddress {
        address: Address,
    },
    SetShippingMethod {
        method: ShippingMethod,
    },
    AddPayment {
        amount_cents: i64,
        payment_method_id: Uuid,
        idempotency_key: Option<String>,
    },
    // Gateway callback commands, replayed at-least-once by workers
    AuthorizePayment {
        payment_id: Uuid,
        transaction_ref: String,
        idempotency_key: Option<String>,
    },
    CapturePayment {
        payment_id: Uuid,
        idempotency_key: Option<String>,
    },
    VoidPayment {
        payment_id: Uuid,
    },
    RefundPayment {
        payment_id: Uuid,
        amount_cents: i64,
    },
    FailPayment {
        payment_id: Uuid,
    },
    Next,
    Cancel,
}

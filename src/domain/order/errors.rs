use uuid::Uuid;

use super::value_objects::OrderState;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot leave cart without any line items")]
    EmptyCart,

    #[error("Ship and bill addresses are required before delivery")]
    AddressRequired,

    #[error("A shipping method must be selected before payment")]
    ShippingMethodRequired,

    #[error("Payments cover {covered_cents} of the {total_cents} total")]
    InsufficientPayment {
        total_cents: i64,
        covered_cents: i64,
    },

    #[error("Every counted payment must be captured before completion")]
    PaymentNotCompleted,

    #[error("Order in state {0:?} has no further states")]
    NoFurtherStates(OrderState),

    #[error("A completed order cannot be canceled")]
    CannotCancelCompleted,

    #[error("Line items can only be modified while the order is a cart")]
    CannotModifyAfterCart,

    #[error("Addresses cannot be changed in state {0:?}")]
    InvalidStateForAddress(OrderState),

    #[error("Shipping cannot be selected in state {0:?}")]
    InvalidStateForShipping(OrderState),

    #[error("Order in terminal state {0:?} cannot be modified")]
    OrderImmutable(OrderState),

    #[error("Quantity must be at least 1, got {0}")]
    TooFewItems(u32),

    #[error("Variant {variant_id} has no price in {currency}")]
    VariantNotPurchasable {
        variant_id: Uuid,
        currency: String,
    },

    #[error("No line item with id {0}")]
    LineItemNotFound(Uuid),

    #[error("No payment with id {0}")]
    PaymentNotFound(Uuid),

    #[error("A different promotion is already applied to this order")]
    PromotionAlreadyApplied,

    #[error("Payment amount must not be negative, got {0}")]
    InvalidPaymentAmount(i64),

    #[error("A fully digital order takes no shipping details")]
    DigitalOrderNoShipping,
}

// ============================================================================
// Invariant Violations - Diagnostic Findings
// ============================================================================
//
// Surfaced only by `Order::validate_invariants`, never by request flow.
//
// ============================================================================

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("Grand total {actual} does not equal the component sum {expected}")]
    TotalMismatch { expected: i64, actual: i64 },

    #[error("Item total {actual} does not match the line items, expected {expected}")]
    ItemTotalMismatch { expected: i64, actual: i64 },

    #[error("Adjustment total {actual} does not match eligible adjustments, expected {expected}")]
    AdjustmentTotalMismatch { expected: i64, actual: i64 },

    #[error("Line item {line_item_id} has zero quantity")]
    ZeroQuantityLine { line_item_id: Uuid },

    #[error("Completed order is missing its completion timestamp")]
    MissingCompletedAt,

    #[error("Canceled order is missing its cancellation timestamp")]
    MissingCanceledAt,
}

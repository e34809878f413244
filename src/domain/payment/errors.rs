use super::value_objects::PaymentState;

// ============================================================================
// Payment Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Cannot {action} a payment in state {from:?}")]
    InvalidTransition {
        from: PaymentState,
        action: &'static str,
    },

    #[error("Idempotency key does not match the key stored on this payment")]
    IdempotencyKeyConflict,

    #[error("Invalid refund amount: {0}")]
    InvalidRefundAmount(i64),

    #[error("Refund of {requested_cents} exceeds the {remaining_cents} still captured")]
    RefundExceedsCaptured {
        requested_cents: i64,
        remaining_cents: i64,
    },
}

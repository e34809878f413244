use serde::{Deserialize, Serialize};

// ============================================================================
// Payment Value Objects
// ============================================================================

/// Lifecycle state of a single funding attempt.
///
/// The payment machine runs independently of the order machine; the order
/// only reads aggregate payment state to gate its own transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    Pending,
    Authorizing,
    Authorized,
    Capturing,
    Completed,
    PartiallyRefunded,
    Refunded,
    Failed,
    Void,
}

impl PaymentState {
    /// Whether a payment in this state still counts toward covering the
    /// order total. Voided and failed attempts do not.
    pub fn counts_toward_total(self) -> bool {
        !matches!(self, Self::Void | Self::Failed)
    }

    /// States from which the gateway may still report a failure.
    pub fn can_fail(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Authorizing | Self::Authorized | Self::Capturing
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// ISO-4217 currency code, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(pub String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checkout lifecycle state. `next()` walks the sequence one step at a
/// time; `Canceled` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Cart,
    Address,
    Delivery,
    Payment,
    Confirm,
    Complete,
    Canceled,
}

impl OrderState {
    /// The state `next()` advances into, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Cart => Some(Self::Address),
            Self::Address => Some(Self::Delivery),
            Self::Delivery => Some(Self::Payment),
            Self::Payment => Some(Self::Confirm),
            Self::Confirm => Some(Self::Complete),
            Self::Complete | Self::Canceled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Canceled)
    }
}

/// Postal address attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

/// Signed monetary delta applied at order or line-item scope.
///
/// Ineligible adjustments are kept for audit but excluded from every total,
/// which lets the promotion engine withdraw a discount without erasing
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub amount_cents: i64,
    pub label: String,
    pub promotion_id: Option<Uuid>,
    pub eligible: bool,
    /// Only meaningful at order scope (e.g. an operator surcharge that a
    /// promotion may not remove). Line-item adjustments carry `false`.
    pub mandatory: bool,
}

impl Adjustment {
    /// Adjustment materialized from a promotion action.
    pub fn from_promotion(promotion_id: Uuid, label: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount_cents,
            label: label.into(),
            promotion_id: Some(promotion_id),
            eligible: true,
            mandatory: false,
        }
    }
}

/// One variant within an order: quantity plus a price snapshot taken at
/// add time, so later catalog changes never rewrite an open cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub quantity: u32,
    pub unit_price_cents: i64,
    /// Snapshot of the variant's digital flag; drives the fully-digital
    /// determination without consulting the catalog again.
    pub digital: bool,
    pub adjustments: Vec<Adjustment>,
}

impl LineItem {
    pub fn new(variant_id: Uuid, quantity: u32, unit_price_cents: i64, digital: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            variant_id,
            quantity,
            unit_price_cents,
            digital,
            adjustments: Vec::new(),
        }
    }

    pub fn subtotal_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }

    /// Sum of eligible adjustments scoped to this line.
    pub fn eligible_adjustment_cents(&self) -> i64 {
        self.adjustments
            .iter()
            .filter(|a| a.eligible)
            .map(|a| a.amount_cents)
            .sum()
    }
}

/// Fulfillment record slot. Populated by the external fulfillment engine;
/// the order core creates and validates none of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub shipping_method_id: Uuid,
    pub tracking_ref: Option<String>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_sequence() {
        let mut state = OrderState::Cart;
        let mut walked = vec![state];
        while let Some(next) = state.successor() {
            state = next;
            walked.push(state);
        }

        assert_eq!(
            walked,
            vec![
                OrderState::Cart,
                OrderState::Address,
                OrderState::Delivery,
                OrderState::Payment,
                OrderState::Confirm,
                OrderState::Complete,
            ]
        );
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        assert!(OrderState::Complete.successor().is_none());
        assert!(OrderState::Canceled.successor().is_none());
        assert!(OrderState::Complete.is_terminal());
        assert!(OrderState::Canceled.is_terminal());
        assert!(!OrderState::Confirm.is_terminal());
    }

    #[test]
    fn test_line_item_subtotal() {
        let item = LineItem::new(Uuid::new_v4(), 3, 1250, false);
        assert_eq!(item.subtotal_cents(), 3750);
    }

    #[test]
    fn test_line_item_ignores_ineligible_adjustments() {
        let mut item = LineItem::new(Uuid::new_v4(), 1, 1000, false);
        let promotion_id = Uuid::new_v4();
        item.adjustments
            .push(Adjustment::from_promotion(promotion_id, "10% off", -100));

        let mut withdrawn = Adjustment::from_promotion(promotion_id, "expired", -500);
        withdrawn.eligible = false;
        item.adjustments.push(withdrawn);

        assert_eq!(item.eligible_adjustment_cents(), -100);
    }

    #[test]
    fn test_currency_equality() {
        assert_eq!(Currency::new("USD"), Currency::new("USD"));
        assert_ne!(Currency::new("USD"), Currency::new("usd"));
    }

    #[test]
    fn test_state_serialization() {
        let state = OrderState::Delivery;
        let json = serde_json::to_string(&state).unwrap();
        let back: OrderState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}

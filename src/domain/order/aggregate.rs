use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::catalog::{ShippingMethod, Variant};
use crate::domain::payment::Payment;
use crate::domain::promotion::{Promotion, PromotionAction};
use crate::outbox::EventOutbox;
use super::errors::{InvariantViolation, OrderError};
use super::events::*;
use super::value_objects::{Address, Adjustment, Currency, LineItem, OrderState, Shipment};

// ============================================================================
// Order Aggregate - Lifecycle State Machine and Totals
// ============================================================================
//
// The aggregate root composing line items, payments, adjustments and
// shipments. All mutation goes through its methods; each money-affecting
// method recalculates the cached totals before returning, so no caller
// ever observes an order whose totals disagree with its contents.
//
// The aggregate performs no I/O. External effects (inventory, gateway
// work) are requested through events buffered in the outbox and dispatched
// by the persistence layer after its transaction commits.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub store_id: Uuid,
    pub number: String,
    pub currency: Currency,
    pub state: OrderState,

    // Cached totals, all in cents
    pub item_total_cents: i64,
    pub shipment_total_cents: i64,
    pub adjustment_total_cents: i64,
    pub total_cents: i64,

    // Active promotion bookkeeping
    pub promotion_id: Option<Uuid>,
    pub promotion_code: Option<String>,

    // Fulfillment details
    pub ship_address: Option<Address>,
    pub bill_address: Option<Address>,
    pub shipping_method_id: Option<Uuid>,

    // Audit trail
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Optimistic-concurrency token, bumped by the store on save
    pub version: i64,

    // Child entities
    pub line_items: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub adjustments: Vec<Adjustment>,
    pub shipments: Vec<Shipment>,

    // Buffered events awaiting post-commit dispatch; not persisted
    #[serde(skip)]
    outbox: EventOutbox<OrderEvent>,
}

impl Order {
    /// Start a new order in `Cart` with zero totals.
    pub fn create(store_id: Uuid, currency: Currency) -> Self {
        let id = Uuid::new_v4();
        let number = format!("N{}", &id.simple().to_string()[..12].to_uppercase());
        let now = Utc::now();

        let mut order = Self {
            id,
            store_id,
            number: number.clone(),
            currency: currency.clone(),
            state: OrderState::Cart,
            item_total_cents: 0,
            shipment_total_cents: 0,
            adjustment_total_cents: 0,
            total_cents: 0,
            promotion_id: None,
            promotion_code: None,
            ship_address: None,
            bill_address: None,
            shipping_method_id: None,
            completed_at: None,
            canceled_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
            line_items: Vec::new(),
            payments: Vec::new(),
            adjustments: Vec::new(),
            shipments: Vec::new(),
            outbox: EventOutbox::new(),
        };

        order.outbox.record(OrderEvent::Created(OrderCreated {
            order_id: id,
            store_id,
            currency,
            number,
        }));
        order
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// An order with items and not a single physical one among them.
    pub fn is_fully_digital(&self) -> bool {
        !self.line_items.is_empty() && self.line_items.iter().all(|line| line.digital)
    }

    /// Sum of payment amounts still counting toward the total
    /// (everything not voided or failed).
    pub fn payment_total_cents(&self) -> i64 {
        self.payments
            .iter()
            .filter(|p| p.counts_toward_total())
            .map(|p| p.amount_cents)
            .sum()
    }

    pub fn line_item(&self, id: Uuid) -> Option<&LineItem> {
        self.line_items.iter().find(|line| line.id == id)
    }

    pub fn payment(&self, id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn payment_mut(&mut self, id: Uuid) -> Result<&mut Payment, OrderError> {
        self.payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(OrderError::PaymentNotFound(id))
    }

    /// Move all buffered events out of the outbox, exactly once.
    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        self.outbox.drain()
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// Advance one step through the checkout sequence, enforcing the guard
    /// for the transition being attempted.
    pub fn next(&mut self) -> Result<OrderState, OrderError> {
        let from = self.state;
        let to = from.successor().ok_or(OrderError::NoFurtherStates(from))?;

        match from {
            OrderState::Cart => {
                if self.line_items.is_empty() {
                    return Err(OrderError::EmptyCart);
                }
            }
            OrderState::Address => {
                // Fully digital orders have no shipping leg to validate.
                if !self.is_fully_digital()
                    && (self.ship_address.is_none() || self.bill_address.is_none())
                {
                    return Err(OrderError::AddressRequired);
                }
            }
            OrderState::Delivery => {
                if !self.is_fully_digital() && self.shipping_method_id.is_none() {
                    return Err(OrderError::ShippingMethodRequired);
                }
            }
            OrderState::Payment => {
                let covered_cents = self.payment_total_cents();
                if covered_cents < self.total_cents {
                    return Err(OrderError::InsufficientPayment {
                        total_cents: self.total_cents,
                        covered_cents,
                    });
                }
            }
            OrderState::Confirm => {
                let uncaptured = self
                    .payments
                    .iter()
                    .filter(|p| p.counts_toward_total())
                    .any(|p| p.state != crate::domain::payment::PaymentState::Completed);
                if uncaptured {
                    return Err(OrderError::PaymentNotCompleted);
                }
            }
            OrderState::Complete | OrderState::Canceled => unreachable!("no successor"),
        }

        self.state = to;
        self.touch();
        self.outbox
            .record(OrderEvent::Advanced(OrderAdvanced { from, to }));

        if to == OrderState::Complete {
            let completed_at = Utc::now();
            self.completed_at = Some(completed_at);
            self.outbox
                .record(OrderEvent::FinalizeInventory(InventoryFinalization {
                    originator: StockOriginator::Order(self.id),
                    lines: self.stock_lines(),
                    completed_at,
                }));
        }

        Ok(to)
    }

    /// Cancel the order from any non-terminal state.
    ///
    /// Re-canceling an already canceled order is a safe repeat: it returns
    /// success without touching `canceled_at` or buffering anything.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.state {
            OrderState::Complete => Err(OrderError::CannotCancelCompleted),
            OrderState::Canceled => Ok(()),
            _ => {
                let canceled_at = Utc::now();
                self.state = OrderState::Canceled;
                self.canceled_at = Some(canceled_at);
                self.touch();
                self.outbox
                    .record(OrderEvent::Canceled(OrderCanceled { canceled_at }));
                self.outbox
                    .record(OrderEvent::ReleaseInventory(InventoryRelease {
                        originator: StockOriginator::Order(self.id),
                        lines: self.stock_lines(),
                    }));
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Line item management
    // ------------------------------------------------------------------

    /// Add a variant to the cart, merging quantity into an existing line
    /// for the same variant. Returns the line item id.
    pub fn add_line_item(&mut self, variant: &Variant, quantity: u32) -> Result<Uuid, OrderError> {
        self.ensure_cart()?;
        if quantity == 0 {
            return Err(OrderError::TooFewItems(quantity));
        }
        let unit_price_cents =
            variant
                .price_in(&self.currency)
                .ok_or(OrderError::VariantNotPurchasable {
                    variant_id: variant.id,
                    currency: self.currency.as_str().to_string(),
                })?;

        let id = match self
            .line_items
            .iter_mut()
            .find(|line| line.variant_id == variant.id)
        {
            Some(line) => {
                line.quantity += quantity;
                line.id
            }
            None => {
                let line = LineItem::new(variant.id, quantity, unit_price_cents, variant.digital);
                let id = line.id;
                self.line_items.push(line);
                id
            }
        };

        self.recalculate();
        Ok(id)
    }

    pub fn remove_line_item(&mut self, id: Uuid) -> Result<(), OrderError> {
        self.ensure_cart()?;
        let index = self
            .line_items
            .iter()
            .position(|line| line.id == id)
            .ok_or(OrderError::LineItemNotFound(id))?;

        self.line_items.remove(index);
        self.recalculate();
        Ok(())
    }

    pub fn update_line_item_quantity(&mut self, id: Uuid, quantity: u32) -> Result<(), OrderError> {
        self.ensure_cart()?;
        if quantity == 0 {
            return Err(OrderError::TooFewItems(quantity));
        }
        let line = self
            .line_items
            .iter_mut()
            .find(|line| line.id == id)
            .ok_or(OrderError::LineItemNotFound(id))?;

        line.quantity = quantity;
        self.recalculate();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Promotion application
    // ------------------------------------------------------------------

    /// Attach a promotion and materialize its actions as adjustments.
    ///
    /// At most one promotion is active at a time; re-applying the same one
    /// is a safe repeat.
    pub fn apply_promotion(
        &mut self,
        promotion: &Promotion,
        code: Option<&str>,
    ) -> Result<(), OrderError> {
        self.ensure_mutable()?;

        if let Some(active) = self.promotion_id {
            if active == promotion.id {
                return Ok(());
            }
            return Err(OrderError::PromotionAlreadyApplied);
        }

        for action in &promotion.actions {
            match action {
                PromotionAction::OrderDiscount { amount_cents } => {
                    self.adjustments.push(Adjustment::from_promotion(
                        promotion.id,
                        promotion.name.clone(),
                        -amount_cents,
                    ));
                }
                PromotionAction::LineItemDiscount { percent } => {
                    for line in &mut self.line_items {
                        let discount_cents = line.subtotal_cents() * i64::from(*percent) / 100;
                        if discount_cents > 0 {
                            line.adjustments.push(Adjustment::from_promotion(
                                promotion.id,
                                promotion.name.clone(),
                                -discount_cents,
                            ));
                        }
                    }
                }
            }
        }

        self.promotion_id = Some(promotion.id);
        self.promotion_code = code.map(str::to_string).or_else(|| promotion.code.clone());
        self.recalculate();
        self.outbox
            .record(OrderEvent::PromotionApplied(OrderPromotionApplied {
                promotion_id: promotion.id,
                code: self.promotion_code.clone(),
            }));
        Ok(())
    }

    /// Strip every adjustment produced by the active promotion and restore
    /// the unpromoted totals. A no-op when no promotion is active.
    pub fn remove_promotion(&mut self) -> Result<(), OrderError> {
        self.ensure_mutable()?;

        let Some(active) = self.promotion_id else {
            return Ok(());
        };

        self.adjustments.retain(|a| a.promotion_id != Some(active));
        for line in &mut self.line_items {
            line.adjustments.retain(|a| a.promotion_id != Some(active));
        }

        self.promotion_id = None;
        self.promotion_code = None;
        self.recalculate();
        self.outbox
            .record(OrderEvent::PromotionRemoved(OrderPromotionRemoved {
                promotion_id: active,
            }));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Attach a `Pending` funding attempt. Does not change order state.
    ///
    /// A retry carrying an idempotency key already present on the order is
    /// recognized as a duplicate and returns the existing payment's id.
    pub fn add_payment(
        &mut self,
        amount_cents: i64,
        payment_method_id: Uuid,
        idempotency_key: Option<&str>,
    ) -> Result<Uuid, OrderError> {
        self.ensure_mutable()?;
        if amount_cents < 0 {
            return Err(OrderError::InvalidPaymentAmount(amount_cents));
        }

        if let Some(key) = idempotency_key {
            if let Some(existing) = self
                .payments
                .iter()
                .find(|p| p.idempotency_key.as_deref() == Some(key))
            {
                return Ok(existing.id);
            }
        }

        let payment = Payment::new(
            self.id,
            amount_cents,
            self.currency.clone(),
            payment_method_id,
            idempotency_key.map(str::to_string),
        );
        let payment_id = payment.id;
        self.payments.push(payment);
        self.touch();
        self.outbox
            .record(OrderEvent::PaymentAdded(OrderPaymentAdded {
                payment_id,
                amount_cents,
            }));
        Ok(payment_id)
    }

    // ------------------------------------------------------------------
    // Address & shipping selection
    // ------------------------------------------------------------------

    pub fn set_shipping_address(&mut self, address: Address) -> Result<(), OrderError> {
        self.ensure_address_window()?;
        self.ship_address = Some(address);
        self.touch();
        Ok(())
    }

    pub fn set_billing_address(&mut self, address: Address) -> Result<(), OrderError> {
        self.ensure_address_window()?;
        self.bill_address = Some(address);
        self.touch();
        Ok(())
    }

    /// Select a shipping method and recompute the shipment total from its
    /// base cost.
    pub fn set_shipping_method(&mut self, method: &ShippingMethod) -> Result<(), OrderError> {
        if !matches!(
            self.state,
            OrderState::Cart | OrderState::Address | OrderState::Delivery
        ) {
            return Err(OrderError::InvalidStateForShipping(self.state));
        }
        if self.is_fully_digital() {
            return Err(OrderError::DigitalOrderNoShipping);
        }

        self.shipping_method_id = Some(method.id);
        self.shipment_total_cents = method.base_cost_cents;
        self.recalculate();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Re-verify every structural invariant from scratch.
    ///
    /// Independent of the request flow: it recomputes what the cached
    /// totals should be and reports every discrepancy it finds.
    pub fn validate_invariants(&self) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();

        let expected_item = self.computed_item_total_cents();
        if expected_item != self.item_total_cents {
            violations.push(InvariantViolation::ItemTotalMismatch {
                expected: expected_item,
                actual: self.item_total_cents,
            });
        }

        let expected_adjustment = self.computed_adjustment_total_cents();
        if expected_adjustment != self.adjustment_total_cents {
            violations.push(InvariantViolation::AdjustmentTotalMismatch {
                expected: expected_adjustment,
                actual: self.adjustment_total_cents,
            });
        }

        let expected_total =
            self.item_total_cents + self.shipment_total_cents + self.adjustment_total_cents;
        if expected_total != self.total_cents {
            violations.push(InvariantViolation::TotalMismatch {
                expected: expected_total,
                actual: self.total_cents,
            });
        }

        for line in &self.line_items {
            if line.quantity == 0 {
                violations.push(InvariantViolation::ZeroQuantityLine {
                    line_item_id: line.id,
                });
            }
        }

        if self.state == OrderState::Complete && self.completed_at.is_none() {
            violations.push(InvariantViolation::MissingCompletedAt);
        }
        if self.state == OrderState::Canceled && self.canceled_at.is_none() {
            violations.push(InvariantViolation::MissingCanceledAt);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn computed_item_total_cents(&self) -> i64 {
        self.line_items
            .iter()
            .map(|line| line.subtotal_cents() + line.eligible_adjustment_cents())
            .sum()
    }

    fn computed_adjustment_total_cents(&self) -> i64 {
        self.adjustments
            .iter()
            .filter(|a| a.eligible)
            .map(|a| a.amount_cents)
            .sum()
    }

    /// Single recomputation routine run inside every money-affecting
    /// operation. Idempotent.
    fn recalculate(&mut self) {
        self.item_total_cents = self.computed_item_total_cents();
        self.adjustment_total_cents = self.computed_adjustment_total_cents();
        self.total_cents =
            self.item_total_cents + self.shipment_total_cents + self.adjustment_total_cents;
        self.touch();
    }

    fn stock_lines(&self) -> Vec<StockLine> {
        self.line_items
            .iter()
            .map(|line| StockLine {
                variant_id: line.variant_id,
                quantity: line.quantity,
            })
            .collect()
    }

    fn ensure_cart(&self) -> Result<(), OrderError> {
        if self.state != OrderState::Cart {
            return Err(OrderError::CannotModifyAfterCart);
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), OrderError> {
        if self.state.is_terminal() {
            return Err(OrderError::OrderImmutable(self.state));
        }
        Ok(())
    }

    fn ensure_address_window(&self) -> Result<(), OrderError> {
        if !matches!(self.state, OrderState::Cart | OrderState::Address) {
            return Err(OrderError::InvalidStateForAddress(self.state));
        }
        if self.is_fully_digital() {
            return Err(OrderError::DigitalOrderNoShipping);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentState;

    fn usd() -> Currency {
        Currency::new("USD")
    }

    fn physical_variant(unit_price_cents: i64) -> Variant {
        Variant::new("SHIRT-M", false).with_price(usd(), unit_price_cents)
    }

    fn digital_variant(unit_price_cents: i64) -> Variant {
        Variant::new("EBOOK", true).with_price(usd(), unit_price_cents)
    }

    fn test_address() -> Address {
        Address {
            street: "123 Main St".to_string(),
            city: "Anytown".to_string(),
            region: "CA".to_string(),
            postal_code: "12345".to_string(),
            country: "USA".to_string(),
        }
    }

    fn order_discount(amount_cents: i64) -> Promotion {
        Promotion::new(
            "flat discount",
            vec![PromotionAction::OrderDiscount { amount_cents }],
        )
    }

    /// Digital-only order advanced into the Payment state with the given
    /// item price. Digital orders skip the address and delivery guards.
    fn order_in_payment(unit_price_cents: i64) -> Order {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&digital_variant(unit_price_cents), 1).unwrap();
        order.next().unwrap(); // Address
        order.next().unwrap(); // Delivery
        order.next().unwrap(); // Payment
        assert_eq!(order.state, OrderState::Payment);
        order
    }

    fn completed_order() -> Order {
        let mut order = order_in_payment(1000);
        let payment_id = order.add_payment(1000, Uuid::new_v4(), None).unwrap();
        let payment = order.payment_mut(payment_id).unwrap();
        payment.authorize("txn-1", None).unwrap();
        payment.capture(None).unwrap();
        order.next().unwrap(); // Confirm
        order.next().unwrap(); // Complete
        order
    }

    #[test]
    fn test_create_starts_in_cart_with_zero_totals() {
        let order = Order::create(Uuid::new_v4(), usd());

        assert_eq!(order.state, OrderState::Cart);
        assert_eq!(order.item_total_cents, 0);
        assert_eq!(order.shipment_total_cents, 0);
        assert_eq!(order.adjustment_total_cents, 0);
        assert_eq!(order.total_cents, 0);
        assert!(order.number.starts_with('N'));
        assert!(order.validate_invariants().is_ok());
    }

    #[test]
    fn test_item_totals_after_add() {
        // Scenario: two units at $10.00 each.
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();

        assert_eq!(order.item_total_cents, 2000);
        assert_eq!(order.total_cents, 2000);
        assert!(order.validate_invariants().is_ok());
    }

    #[test]
    fn test_adding_same_variant_merges_quantity() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        let variant = physical_variant(500);

        let first = order.add_line_item(&variant, 1).unwrap();
        let second = order.add_line_item(&variant, 2).unwrap();

        assert_eq!(first, second);
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_item(first).map(|l| l.quantity), Some(3));
        assert_eq!(order.item_total_cents, 1500);
    }

    #[test]
    fn test_add_zero_quantity_rejected() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        let result = order.add_line_item(&physical_variant(1000), 0);
        assert!(matches!(result.unwrap_err(), OrderError::TooFewItems(0)));
    }

    #[test]
    fn test_add_unpriced_variant_rejected() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        let variant = Variant::new("GBP-ONLY", false).with_price(Currency::new("GBP"), 900);

        let result = order.add_line_item(&variant, 1);
        assert!(matches!(
            result.unwrap_err(),
            OrderError::VariantNotPurchasable { .. }
        ));
    }

    #[test]
    fn test_line_items_frozen_after_cart() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 1).unwrap();
        order.next().unwrap();

        let result = order.add_line_item(&physical_variant(1000), 1);
        assert!(matches!(
            result.unwrap_err(),
            OrderError::CannotModifyAfterCart
        ));
    }

    #[test]
    fn test_remove_line_item_restores_previous_total() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 1).unwrap();
        let before = order.item_total_cents;

        let id = order.add_line_item(&digital_variant(700), 3).unwrap();
        assert_eq!(order.item_total_cents, before + 2100);

        order.remove_line_item(id).unwrap();
        assert_eq!(order.item_total_cents, before);
        assert!(order.validate_invariants().is_ok());
    }

    #[test]
    fn test_remove_unknown_line_item() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        let result = order.remove_line_item(Uuid::new_v4());
        assert!(matches!(
            result.unwrap_err(),
            OrderError::LineItemNotFound(_)
        ));
    }

    #[test]
    fn test_update_quantity_recalculates() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        let id = order.add_line_item(&physical_variant(250), 2).unwrap();

        order.update_line_item_quantity(id, 5).unwrap();
        assert_eq!(order.item_total_cents, 1250);

        let result = order.update_line_item_quantity(id, 0);
        assert!(matches!(result.unwrap_err(), OrderError::TooFewItems(0)));

        let result = order.update_line_item_quantity(Uuid::new_v4(), 1);
        assert!(matches!(
            result.unwrap_err(),
            OrderError::LineItemNotFound(_)
        ));
    }

    #[test]
    fn test_order_discount_promotion_and_removal() {
        // Scenario: $20.00 of items, $2.00 fixed discount, then removal.
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();

        let promotion = order_discount(200).with_code("SAVE2");
        order.apply_promotion(&promotion, Some("SAVE2")).unwrap();

        assert_eq!(order.adjustment_total_cents, -200);
        assert_eq!(order.total_cents, 1800);
        assert_eq!(order.promotion_id, Some(promotion.id));
        assert_eq!(order.promotion_code.as_deref(), Some("SAVE2"));
        assert!(order.validate_invariants().is_ok());

        order.remove_promotion().unwrap();
        assert_eq!(order.adjustment_total_cents, 0);
        assert_eq!(order.total_cents, 2000);
        assert!(order.promotion_id.is_none());
        assert!(order.promotion_code.is_none());
        assert!(order.adjustments.is_empty());
    }

    #[test]
    fn test_line_item_percent_promotion() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();

        let promotion = Promotion::new(
            "10% off items",
            vec![PromotionAction::LineItemDiscount { percent: 10 }],
        );
        order.apply_promotion(&promotion, None).unwrap();

        // 10% of the 2000-cent line, floored.
        assert_eq!(order.line_items[0].eligible_adjustment_cents(), -200);
        assert_eq!(order.item_total_cents, 1800);
        assert_eq!(order.total_cents, 1800);

        order.remove_promotion().unwrap();
        assert_eq!(order.item_total_cents, 2000);
        assert!(order.line_items[0].adjustments.is_empty());
    }

    #[test]
    fn test_reapplying_same_promotion_is_idempotent() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();

        let promotion = order_discount(200);
        order.apply_promotion(&promotion, None).unwrap();
        order.apply_promotion(&promotion, None).unwrap();

        assert_eq!(order.adjustments.len(), 1);
        assert_eq!(order.total_cents, 1800);
    }

    #[test]
    fn test_second_promotion_rejected() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();

        order.apply_promotion(&order_discount(200), None).unwrap();
        let result = order.apply_promotion(&order_discount(300), None);
        assert!(matches!(
            result.unwrap_err(),
            OrderError::PromotionAlreadyApplied
        ));
    }

    #[test]
    fn test_remove_promotion_without_active_is_noop() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        assert!(order.remove_promotion().is_ok());
    }

    #[test]
    fn test_ineligible_adjustment_excluded_from_totals() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();
        order.apply_promotion(&order_discount(200), None).unwrap();

        // Promotion engine withdraws the discount without deleting it.
        order.adjustments[0].eligible = false;
        order.recalculate();

        assert_eq!(order.adjustment_total_cents, 0);
        assert_eq!(order.total_cents, 2000);
        assert_eq!(order.adjustments.len(), 1);
        assert!(order.validate_invariants().is_ok());
    }

    #[test]
    fn test_address_guard_for_physical_order() {
        // Scenario: physical cart walks Cart -> Address, then is held at
        // the address guard until both addresses are present.
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 1).unwrap();

        assert_eq!(order.next().unwrap(), OrderState::Address);

        let result = order.next();
        assert!(matches!(result.unwrap_err(), OrderError::AddressRequired));

        order.set_shipping_address(test_address()).unwrap();
        let result = order.next();
        assert!(matches!(result.unwrap_err(), OrderError::AddressRequired));

        order.set_billing_address(test_address()).unwrap();
        assert_eq!(order.next().unwrap(), OrderState::Delivery);
    }

    #[test]
    fn test_empty_cart_cannot_advance() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        assert!(matches!(order.next().unwrap_err(), OrderError::EmptyCart));
    }

    #[test]
    fn test_shipping_method_guard() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 1).unwrap();
        order.set_shipping_address(test_address()).unwrap();
        order.set_billing_address(test_address()).unwrap();
        order.next().unwrap(); // Address
        order.next().unwrap(); // Delivery

        let result = order.next();
        assert!(matches!(
            result.unwrap_err(),
            OrderError::ShippingMethodRequired
        ));

        let method = ShippingMethod::new("standard", 500);
        order.set_shipping_method(&method).unwrap();
        assert_eq!(order.shipment_total_cents, 500);
        assert_eq!(order.total_cents, 1500);

        assert_eq!(order.next().unwrap(), OrderState::Payment);
    }

    #[test]
    fn test_digital_order_skips_shipping_guards() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&digital_variant(900), 1).unwrap();

        assert_eq!(order.next().unwrap(), OrderState::Address);
        assert_eq!(order.next().unwrap(), OrderState::Delivery);
        assert_eq!(order.next().unwrap(), OrderState::Payment);
    }

    #[test]
    fn test_digital_order_rejects_shipping_details() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&digital_variant(900), 1).unwrap();

        assert!(matches!(
            order.set_shipping_address(test_address()).unwrap_err(),
            OrderError::DigitalOrderNoShipping
        ));
        assert!(matches!(
            order.set_billing_address(test_address()).unwrap_err(),
            OrderError::DigitalOrderNoShipping
        ));
        assert!(matches!(
            order
                .set_shipping_method(&ShippingMethod::new("standard", 500))
                .unwrap_err(),
            OrderError::DigitalOrderNoShipping
        ));
    }

    #[test]
    fn test_shipping_selection_window() {
        let mut order = order_in_payment(1000);
        // Payment state is past the shipping window; digital check would
        // also reject, but the window is checked first.
        let result = order.set_shipping_method(&ShippingMethod::new("late", 100));
        assert!(matches!(
            result.unwrap_err(),
            OrderError::InvalidStateForShipping(OrderState::Payment)
        ));
    }

    #[test]
    fn test_payment_gate_blocks_insufficient_cover() {
        let mut order = order_in_payment(1000);
        order.add_payment(400, Uuid::new_v4(), None).unwrap();

        let result = order.next();
        assert!(matches!(
            result.unwrap_err(),
            OrderError::InsufficientPayment {
                total_cents: 1000,
                covered_cents: 400,
            }
        ));
    }

    #[test]
    fn test_voided_payment_does_not_cover_total() {
        let mut order = order_in_payment(1000);
        let payment_id = order.add_payment(1000, Uuid::new_v4(), None).unwrap();
        order.payment_mut(payment_id).unwrap().void().unwrap();

        assert_eq!(order.payment_total_cents(), 0);
        assert!(matches!(
            order.next().unwrap_err(),
            OrderError::InsufficientPayment { .. }
        ));
    }

    #[test]
    fn test_completion_requires_captured_payments() {
        // Scenario: an uncaptured payment covers the total, which is
        // enough for Confirm but not for Complete.
        let mut order = order_in_payment(1000);
        let payment_id = order.add_payment(1000, Uuid::new_v4(), None).unwrap();

        assert_eq!(order.next().unwrap(), OrderState::Confirm);

        let result = order.next();
        assert!(matches!(
            result.unwrap_err(),
            OrderError::PaymentNotCompleted
        ));

        let payment = order.payment_mut(payment_id).unwrap();
        payment.authorize("txn-1", None).unwrap();
        payment.capture(None).unwrap();
        assert_eq!(payment.state, PaymentState::Completed);

        assert_eq!(order.next().unwrap(), OrderState::Complete);
        assert!(order.completed_at.is_some());
        assert!(order.validate_invariants().is_ok());
    }

    #[test]
    fn test_completion_buffers_inventory_finalization() {
        let mut order = completed_order();
        let events = order.drain_events();

        let finalize = events
            .iter()
            .find_map(|e| match e {
                OrderEvent::FinalizeInventory(f) => Some(f),
                _ => None,
            })
            .expect("completion must request inventory finalization");

        assert_eq!(finalize.originator, StockOriginator::Order(order.id));
        assert_eq!(finalize.lines.len(), 1);
        assert_eq!(finalize.lines[0].quantity, 1);
    }

    #[test]
    fn test_cancel_from_cart_and_idempotent_repeat() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 1).unwrap();

        order.cancel().unwrap();
        assert_eq!(order.state, OrderState::Canceled);
        let first_canceled_at = order.canceled_at.expect("timestamp set");

        let events = order.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, OrderEvent::ReleaseInventory(_))));

        // Safe repeat: state and timestamp untouched, nothing buffered.
        order.cancel().unwrap();
        assert_eq!(order.canceled_at, Some(first_canceled_at));
        assert!(order.drain_events().is_empty());
    }

    #[test]
    fn test_cannot_cancel_completed_order() {
        let mut order = completed_order();
        assert!(matches!(
            order.cancel().unwrap_err(),
            OrderError::CannotCancelCompleted
        ));
    }

    #[test]
    fn test_terminal_states_reject_next_and_mutation() {
        let mut order = completed_order();
        assert!(matches!(
            order.next().unwrap_err(),
            OrderError::NoFurtherStates(OrderState::Complete)
        ));
        assert!(matches!(
            order.add_payment(100, Uuid::new_v4(), None).unwrap_err(),
            OrderError::OrderImmutable(OrderState::Complete)
        ));
        assert!(matches!(
            order.apply_promotion(&order_discount(100), None).unwrap_err(),
            OrderError::OrderImmutable(OrderState::Complete)
        ));
    }

    #[test]
    fn test_add_payment_rejects_negative_amount() {
        let mut order = order_in_payment(1000);
        let result = order.add_payment(-5, Uuid::new_v4(), None);
        assert!(matches!(
            result.unwrap_err(),
            OrderError::InvalidPaymentAmount(-5)
        ));
    }

    #[test]
    fn test_add_payment_duplicate_key_returns_existing() {
        let mut order = order_in_payment(1000);
        let method_id = Uuid::new_v4();

        let first = order.add_payment(1000, method_id, Some("retry-1")).unwrap();
        let second = order.add_payment(1000, method_id, Some("retry-1")).unwrap();

        assert_eq!(first, second);
        assert_eq!(order.payments.len(), 1);
        assert!(order.payment(first).is_some());
    }

    #[test]
    fn test_validate_invariants_reports_corruption() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&physical_variant(1000), 2).unwrap();

        // Simulate a bad persistence round trip.
        order.item_total_cents = 1;

        let violations = order.validate_invariants().unwrap_err();
        assert!(violations.contains(&InvariantViolation::ItemTotalMismatch {
            expected: 2000,
            actual: 1,
        }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, InvariantViolation::TotalMismatch { .. })));
    }

    #[test]
    fn test_validate_invariants_requires_terminal_timestamps() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.state = OrderState::Complete;

        let violations = order.validate_invariants().unwrap_err();
        assert!(violations.contains(&InvariantViolation::MissingCompletedAt));

        order.state = OrderState::Canceled;
        let violations = order.validate_invariants().unwrap_err();
        assert!(violations.contains(&InvariantViolation::MissingCanceledAt));
    }

    #[test]
    fn test_events_drain_exactly_once() {
        let mut order = Order::create(Uuid::new_v4(), usd());
        order.add_line_item(&digital_variant(500), 1).unwrap();
        order.apply_promotion(&order_discount(50), None).unwrap();

        let events = order.drain_events();
        let types: Vec<_> = events
            .iter()
            .map(crate::outbox::DomainEvent::event_type)
            .collect();
        assert_eq!(types, vec!["OrderCreated", "OrderPromotionApplied"]);

        assert!(order.drain_events().is_empty());
    }
}

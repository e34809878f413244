use std::sync::Arc;
use uuid::Uuid;
use anyhow::Result;

use crate::outbox::{DomainEvent, EventEnvelope, EventPublisher, OutboxDispatcher, RetryConfig};
use crate::store::OrderStore;

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::events::OrderEvent;
use super::value_objects::Currency;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Store → Outbox Drain → Publisher
//
// The drain happens strictly after the save succeeded, so a writer that
// loses the version race publishes nothing. Delivery is at-least-once;
// subscribers must tolerate duplicates.
//
// ============================================================================

pub struct OrderCommandHandler<S: OrderStore, P: EventPublisher<OrderEvent>> {
    store: Arc<S>,
    dispatcher: OutboxDispatcher<OrderEvent, P>,
}

impl<S: OrderStore, P: EventPublisher<OrderEvent>> OrderCommandHandler<S, P> {
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self {
            store,
            dispatcher: OutboxDispatcher::new(publisher),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.dispatcher = self.dispatcher.with_retry(retry);
        self
    }

    /// Create and persist a fresh cart, publishing its creation event.
    pub async fn create_order(
        &self,
        store_id: Uuid,
        currency: Currency,
        correlation_id: Uuid,
    ) -> Result<Uuid> {
        let mut order = Order::create(store_id, currency);
        let order_id = order.id;

        self.store.save(&mut order).await?;
        self.publish_drained(&mut order, correlation_id).await?;

        tracing::info!(order_id = %order_id, number = %order.number, "order created");
        Ok(order_id)
    }

    /// Execute one command against a loaded order and persist the result.
    /// Returns the order's new version.
    pub async fn handle(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<i64> {
        let mut order = self.store.load(order_id).await?;

        Self::apply(&mut order, command)?;

        let new_version = self.store.save(&mut order).await?;
        self.publish_drained(&mut order, correlation_id).await?;

        tracing::debug!(
            order_id = %order_id,
            version = new_version,
            state = ?order.state,
            "command handled"
        );
        Ok(new_version)
    }

    fn apply(order: &mut Order, command: OrderCommand) -> Result<()> {
        match command {
            OrderCommand::AddLineItem { variant, quantity } => {
                order.add_line_item(&variant, quantity)?;
            }
            OrderCommand::RemoveLineItem { line_item_id } => {
                order.remove_line_item(line_item_id)?;
            }
            OrderCommand::UpdateLineItemQuantity {
                line_item_id,
                quantity,
            } => {
                order.update_line_item_quantity(line_item_id, quantity)?;
            }
            OrderCommand::ApplyPromotion { promotion, code } => {
                order.apply_promotion(&promotion, code.as_deref())?;
            }
            OrderCommand::RemovePromotion => {
                order.remove_promotion()?;
            }
            OrderCommand::SetShippingAddress { address } => {
                order.set_shipping_address(address)?;
            }
            OrderCommand::SetBillingAddress { address } => {
                order.set_billing_address(address)?;
            }
            OrderCommand::SetShippingMethod { method } => {
                order.set_shipping_method(&method)?;
            }
            OrderCommand::AddPayment {
                amount_cents,
                payment_method_id,
                idempotency_key,
            } => {
                order.add_payment(amount_cents, payment_method_id, idempotency_key.as_deref())?;
            }
            OrderCommand::AuthorizePayment {
                payment_id,
                transaction_ref,
                idempotency_key,
            } => {
                order
                    .payment_mut(payment_id)?
                    .authorize(transaction_ref, idempotency_key.as_deref())?;
            }
            OrderCommand::CapturePayment {
                payment_id,
                idempotency_key,
            } => {
                order
                    .payment_mut(payment_id)?
                    .capture(idempotency_key.as_deref())?;
            }
            OrderCommand::VoidPayment { payment_id } => {
                order.payment_mut(payment_id)?.void()?;
            }
            OrderCommand::RefundPayment {
                payment_id,
                amount_cents,
            } => {
                order.payment_mut(payment_id)?.refund(amount_cents)?;
            }
            OrderCommand::FailPayment { payment_id } => {
                order.payment_mut(payment_id)?.mark_failed()?;
            }
            OrderCommand::Next => {
                order.next()?;
            }
            OrderCommand::Cancel => {
                order.cancel()?;
            }
        }
        Ok(())
    }

    /// Drain the outbox and dispatch, only ever called after a successful
    /// save.
    async fn publish_drained(&self, order: &mut Order, correlation_id: Uuid) -> Result<()> {
        let events = order.drain_events();
        if events.is_empty() {
            return Ok(());
        }

        let order_id = order.id;
        let envelopes: Vec<EventEnvelope<OrderEvent>> = events
            .into_iter()
            .enumerate()
            .map(|(index, event)| {
                EventEnvelope::new(
                    order_id,
                    index as i64 + 1,
                    event.event_type().to_string(),
                    event,
                    correlation_id,
                )
                .with_metadata("order_number", order.number.as_str())
            })
            .collect();

        self.dispatcher.dispatch_all(&envelopes).await
    }
}

// ============================================================================
// Tests
// ============================================================================

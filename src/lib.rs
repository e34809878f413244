// ============================================================================
// order_core - Commerce Order Lifecycle Engine
// ============================================================================
//
// A finite state machine governing an order from cart to fulfillment,
// with monetary-total recalculation, promotion application, line-item
// management, and the payment-sufficiency gate guarding transitions.
//
// Layers:
// - domain:  aggregates and collaborator contracts (no I/O)
// - outbox:  buffered domain events, dispatched after commit
// - store:   persistence boundary with optimistic concurrency
//
// HTTP surfaces, storage providers, the promotion-rule engine and the
// inventory engine are external collaborators reached through the seams
// in `outbox` and `store`.
//
// ============================================================================

pub mod domain;
pub mod outbox;
pub mod store;

pub use domain::catalog::{ShippingMethod, Variant};
pub use domain::order::{
    Adjustment, Address, Currency, InvariantViolation, LineItem, Order, OrderCommand,
    OrderCommandHandler, OrderError, OrderEvent, OrderState, StockLine, StockOriginator,
};
pub use domain::payment::{Payment, PaymentError, PaymentState};
pub use domain::promotion::{Promotion, PromotionAction};
pub use outbox::{DomainEvent, EventEnvelope, EventPublisher, InMemoryEventPublisher};
pub use store::{InMemoryOrderStore, OrderStore, StoreError};

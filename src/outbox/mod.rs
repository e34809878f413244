// ============================================================================
// Outbox - Generic Eventing Infrastructure
// ============================================================================
//
// Generic, reusable buffered-event infrastructure.
// Domain-specific code is in src/domain/
//
// Aggregates append typed events to an in-memory outbox during a mutating
// call; the orchestration layer drains and publishes them only after the
// enclosing save committed, with at-least-once delivery to subscribers.
//
// ============================================================================

pub mod event;
pub mod buffer;
pub mod publisher;
pub mod retry;

// Re-export core types for convenience
pub use event::{deserialize_event, serialize_event, DomainEvent, EventEnvelope, MetadataValue};
pub use buffer::EventOutbox;
pub use publisher::{EventPublisher, InMemoryEventPublisher, OutboxDispatcher, PublishedRecord};
pub use retry::{retry_with_backoff, RetryConfig};

use std::sync::{Arc, Mutex};
use anyhow::Result;
use async_trait::async_trait;

use super::event::{serialize_event, DomainEvent, EventEnvelope};
use super::retry::{retry_with_backoff, RetryConfig};

// ============================================================================
// Event Publisher - Post-Commit Delivery Seam
// ============================================================================
//
// The command handler drains an aggregate's outbox only after the store
// acknowledged the save, then hands the envelopes to a publisher. Delivery
// is at-least-once: subscribers must tolerate duplicates.
//
// ============================================================================

#[async_trait]
pub trait EventPublisher<E: DomainEvent>: Send + Sync {
    async fn publish(&self, envelope: &EventEnvelope<E>) -> Result<()>;
}

// ============================================================================
// Outbox Dispatcher
// ============================================================================

/// Wraps a publisher with bounded backoff so one transient broker hiccup
/// does not drop a drained batch.
pub struct OutboxDispatcher<E: DomainEvent, P: EventPublisher<E>> {
    publisher: Arc<P>,
    retry: RetryConfig,
    _marker: std::marker::PhantomData<E>,
}

impl<E: DomainEvent, P: EventPublisher<E>> OutboxDispatcher<E, P> {
    pub fn new(publisher: Arc<P>) -> Self {
        Self {
            publisher,
            retry: RetryConfig::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Publish a drained batch in order, retrying each envelope on failure.
    pub async fn dispatch_all(&self, envelopes: &[EventEnvelope<E>]) -> Result<()> {
        for envelope in envelopes {
            retry_with_backoff(&self.retry, |_| async {
                self.publisher.publish(envelope).await
            })
            .await?;

            tracing::debug!(
                event_id = %envelope.event_id,
                aggregate_id = %envelope.aggregate_id,
                event_type = %envelope.event_type,
                "event dispatched"
            );
        }
        Ok(())
    }
}

// ============================================================================
// In-Memory Publisher
// ============================================================================

/// Collects published events as serialized records. Used by the test suite
/// and by embedders that drain events without a broker.
#[derive(Default)]
pub struct InMemoryEventPublisher {
    records: Mutex<Vec<PublishedRecord>>,
}

#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub aggregate_id: uuid::Uuid,
    pub event_type: String,
    pub payload: String,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PublishedRecord> {
        self.records.lock().expect("publisher lock poisoned").clone()
    }
}

#[async_trait]
impl<E: DomainEvent> EventPublisher<E> for InMemoryEventPublisher {
    async fn publish(&self, envelope: &EventEnvelope<E>) -> Result<()> {
        let payload = serialize_event(&envelope.event_data)?;
        self.records
            .lock()
            .expect("publisher lock poisoned")
            .push(PublishedRecord {
                aggregate_id: envelope.aggregate_id,
                event_type: envelope.event_type.clone(),
                payload,
            });
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

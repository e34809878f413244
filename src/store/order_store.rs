use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::aggregate::Order;

// ============================================================================
// Order Store - Persistence Boundary Contract
// ============================================================================
//
// Loads and saves the full Order graph atomically. Concurrent writers to
// the same logical order are serialized here: the second writer's save
// fails on the version token instead of corrupting state. Buffered events
// are NOT persisted; the command handler drains and publishes them after
// a successful save.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No order with id {0}")]
    NotFound(Uuid),

    #[error("Version conflict on order {order_id}: expected {expected}, found {actual}")]
    VersionConflict {
        order_id: Uuid,
        expected: i64,
        actual: i64,
    },
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load the full order graph. The returned order carries the version
    /// token its next save must present.
    async fn load(&self, order_id: Uuid) -> Result<Order, StoreError>;

    /// Atomically persist the order, comparing its version token against
    /// the stored one. On success the token is bumped and returned; a
    /// concurrent writer that committed first causes `VersionConflict`.
    async fn save(&self, order: &mut Order) -> Result<i64, StoreError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Store used by the test suite and by embedders that keep orders in
/// process memory.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load(&self, order_id: Uuid) -> Result<Order, StoreError> {
        self.orders
            .lock()
            .expect("store lock poisoned")
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::NotFound(order_id))
    }

    async fn save(&self, order: &mut Order) -> Result<i64, StoreError> {
        let mut orders = self.orders.lock().expect("store lock poisoned");

        if let Some(stored) = orders.get(&order.id) {
            if stored.version != order.version {
                return Err(StoreError::VersionConflict {
                    order_id: order.id,
                    expected: order.version,
                    actual: stored.version,
                });
            }
        }

        order.version += 1;

        // Snapshot without pending events; the live order keeps its
        // buffer for the post-commit drain.
        let mut snapshot = order.clone();
        snapshot.drain_events();
        orders.insert(order.id, snapshot);

        Ok(order.version)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::Currency;

    fn new_order() -> Order {
        Order::create(Uuid::new_v4(), Currency::new("USD"))
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = InMemoryOrderStore::new();
        let mut order = new_order();

        let version = store.save(&mut order).await.unwrap();
        assert_eq!(version, 1);

        let loaded = store.load(order.id).await.unwrap();
        assert_eq!(loaded.id, order.id);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_load_unknown_order() {
        let store = InMemoryOrderStore::new();
        let result = store.load(Uuid::new_v4()).await;
        assert!(matches!(result.unwrap_err(), StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stale_writer_conflicts() {
        let store = InMemoryOrderStore::new();
        let mut order = new_order();
        store.save(&mut order).await.unwrap();

        let mut first = store.load(order.id).await.unwrap();
        let mut second = store.load(order.id).await.unwrap();

        store.save(&mut first).await.unwrap();

        let result = store.save(&mut second).await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_saved_snapshot_carries_no_pending_events() {
        let store = InMemoryOrderStore::new();
        let mut order = new_order(); // Created event still buffered

        store.save(&mut order).await.unwrap();
        assert_eq!(order.drain_events().len(), 1);

        let mut loaded = store.load(order.id).await.unwrap();
        assert!(loaded.drain_events().is_empty());
    }
}

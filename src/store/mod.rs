// ============================================================================
// Store - Persistence Boundary
// ============================================================================
//
// The aggregate never performs I/O; this seam loads and saves the full
// order graph atomically and enforces optimistic concurrency.
//
// ============================================================================

pub mod order_store;

pub use order_store::{InMemoryOrderStore, OrderStore, StoreError};

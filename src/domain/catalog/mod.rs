use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::order::value_objects::Currency;

// ============================================================================
// Catalog Contracts - Collaborators Consumed by the Order Core
// ============================================================================
//
// The order core never manages the catalog; it only reads these snapshots
// to answer purchasability and shipping questions. Taxonomy, pricing rules
// and availability live with the owning service.
//
// ============================================================================

/// Sellable variant snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub sku: String,
    /// Unit price per currency code, in cents.
    pub prices: HashMap<Currency, i64>,
    /// Digital variants need no shipping leg.
    pub digital: bool,
}

impl Variant {
    pub fn new(sku: impl Into<String>, digital: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.into(),
            prices: HashMap::new(),
            digital,
        }
    }

    pub fn with_price(mut self, currency: Currency, unit_price_cents: i64) -> Self {
        self.prices.insert(currency, unit_price_cents);
        self
    }

    /// Unit price in the given currency, if the variant is sold in it.
    pub fn price_in(&self, currency: &Currency) -> Option<i64> {
        self.prices.get(currency).copied()
    }
}

/// Shipping method snapshot; the base cost feeds the order's shipment total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: Uuid,
    pub name: String,
    pub base_cost_cents: i64,
}

impl ShippingMethod {
    pub fn new(name: impl Into<String>, base_cost_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_cost_cents,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

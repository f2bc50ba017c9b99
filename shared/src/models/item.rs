//! Item catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stock-keeping unit in a tenant's catalog.
///
/// `current_stock` is a denormalized cache of the sum of all active batch
/// quantities for this item; the allocation engine and batch ledger are the
/// only writers of stock fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique per tenant (e.g., "AMOX-500-CAP")
    pub sku: String,
    pub name: String,
    /// Unit of measure (e.g., "tablet", "ml", "vial")
    pub unit: String,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub reorder_level: Decimal,
    pub reorder_quantity: Decimal,
    pub current_stock: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Stock at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock <= Decimal::ZERO
    }
}

/// Replenishment suggestion derived from the catalog. Read-only; acting on
/// it (raising a purchase order) is up to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub item_id: Uuid,
    pub sku: String,
    pub name: String,
    pub current_stock: Decimal,
    pub reorder_level: Decimal,
    pub suggested_quantity: Decimal,
    pub estimated_cost: Decimal,
}

impl ReorderSuggestion {
    /// Build a suggestion for a low-stock item.
    /// Returns `None` when the item is inactive or not below threshold.
    pub fn for_item(item: &Item) -> Option<Self> {
        if !item.is_active || !item.is_low_stock() {
            return None;
        }
        Some(Self {
            item_id: item.id,
            sku: item.sku.clone(),
            name: item.name.clone(),
            current_stock: item.current_stock,
            reorder_level: item.reorder_level,
            suggested_quantity: item.reorder_quantity,
            estimated_cost: item.reorder_quantity * item.purchase_price,
        })
    }
}

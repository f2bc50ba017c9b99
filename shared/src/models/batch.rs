//! Batch ledger models and the FEFO allocation planner

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One physical receipt of stock with its own expiry and remaining quantity.
///
/// A depleted batch (`current_quantity == 0`) stays on record for audit but
/// is excluded from allocation. Batches are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Unique within the item (e.g., "B2024-0113")
    pub batch_number: String,
    pub manufacturing_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub initial_quantity: Decimal,
    pub current_quantity: Decimal,
    pub unit_price: Decimal,
    pub vendor_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn is_depleted(&self) -> bool {
        self.current_quantity <= Decimal::ZERO
    }

    pub fn is_expired_at(&self, date: NaiveDate) -> bool {
        self.expiry_date <= date
    }
}

/// The slice of a batch the allocation planner needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableBatch {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub current_quantity: Decimal,
}

/// One batch's contribution to a planned deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub quantity: Decimal,
}

/// Failures of the allocation planner. `LedgerDrift` means the cached item
/// aggregate claimed more stock than the batches hold; the caller must abort
/// the whole operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("deduction quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("batch ledger drifted from cached stock: short by {shortfall}")]
    LedgerDrift { shortfall: Decimal },
}

/// Plan a first-expiring-first-out deduction of `quantity` across `batches`.
///
/// `cached_stock` is the item's denormalized aggregate; the insufficiency
/// check runs against it (fail-fast, before any batch is considered), and a
/// plan that exhausts all batches while `quantity` remains uncovered reports
/// `LedgerDrift` instead of silently under-allocating.
///
/// Ordering: ascending expiry date, ties broken by ascending batch number so
/// repeated runs over the same ledger produce identical plans.
pub fn plan_fefo(
    batches: &[AvailableBatch],
    quantity: Decimal,
    cached_stock: Decimal,
) -> Result<Vec<BatchDraw>, AllocationError> {
    if quantity <= Decimal::ZERO {
        return Err(AllocationError::InvalidQuantity(quantity));
    }
    if quantity > cached_stock {
        return Err(AllocationError::InsufficientStock {
            requested: quantity,
            available: cached_stock,
        });
    }

    let mut ordered: Vec<&AvailableBatch> = batches
        .iter()
        .filter(|b| b.current_quantity > Decimal::ZERO)
        .collect();
    ordered.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.batch_number.cmp(&b.batch_number))
    });

    let mut remaining = quantity;
    let mut draws = Vec::new();
    for batch in ordered {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = batch.current_quantity.min(remaining);
        draws.push(BatchDraw {
            batch_id: batch.batch_id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        return Err(AllocationError::LedgerDrift {
            shortfall: remaining,
        });
    }

    Ok(draws)
}

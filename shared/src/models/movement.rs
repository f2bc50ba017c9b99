//! Stock movement ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One immutable ledger entry recording a quantity change.
///
/// Movements are append-only: no update or delete exists anywhere in the
/// system. One logical stock change may produce several rows (one per batch
/// touched) sharing the same `reference_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub tenant_id: Uuid,
    pub item_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub movement_type: MovementType,
    /// Signed delta: positive for stock in, negative for stock out.
    pub quantity: Decimal,
    pub performed_by: Uuid,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    /// Item stock after this movement was applied, for reconciliation.
    pub stock_after: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Types of stock movements. Closed set; transition and reporting logic
/// matches exhaustively so new variants cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    TransferIn,
    TransferOut,
    AdjustmentAdd,
    AdjustmentRemove,
    ReturnToVendor,
    ReturnFromPatient,
    Expired,
    Damaged,
    Sample,
    InitialStock,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
            MovementType::AdjustmentAdd => "adjustment_add",
            MovementType::AdjustmentRemove => "adjustment_remove",
            MovementType::ReturnToVendor => "return_to_vendor",
            MovementType::ReturnFromPatient => "return_from_patient",
            MovementType::Expired => "expired",
            MovementType::Damaged => "damaged",
            MovementType::Sample => "sample",
            MovementType::InitialStock => "initial_stock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(MovementType::Purchase),
            "sale" => Some(MovementType::Sale),
            "transfer_in" => Some(MovementType::TransferIn),
            "transfer_out" => Some(MovementType::TransferOut),
            "adjustment_add" => Some(MovementType::AdjustmentAdd),
            "adjustment_remove" => Some(MovementType::AdjustmentRemove),
            "return_to_vendor" => Some(MovementType::ReturnToVendor),
            "return_from_patient" => Some(MovementType::ReturnFromPatient),
            "expired" => Some(MovementType::Expired),
            "damaged" => Some(MovementType::Damaged),
            "sample" => Some(MovementType::Sample),
            "initial_stock" => Some(MovementType::InitialStock),
            _ => None,
        }
    }

    /// Whether this movement adds stock (positive delta) or removes it.
    pub fn is_inbound(&self) -> bool {
        match self {
            MovementType::Purchase
            | MovementType::TransferIn
            | MovementType::AdjustmentAdd
            | MovementType::ReturnFromPatient
            | MovementType::InitialStock => true,
            MovementType::Sale
            | MovementType::TransferOut
            | MovementType::AdjustmentRemove
            | MovementType::ReturnToVendor
            | MovementType::Expired
            | MovementType::Damaged
            | MovementType::Sample => false,
        }
    }

    /// Apply the direction sign to an (unsigned) quantity.
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        if self.is_inbound() {
            quantity
        } else {
            -quantity
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ALL: [MovementType; 12] = [
        MovementType::Purchase,
        MovementType::Sale,
        MovementType::TransferIn,
        MovementType::TransferOut,
        MovementType::AdjustmentAdd,
        MovementType::AdjustmentRemove,
        MovementType::ReturnToVendor,
        MovementType::ReturnFromPatient,
        MovementType::Expired,
        MovementType::Damaged,
        MovementType::Sample,
        MovementType::InitialStock,
    ];

    #[test]
    fn test_as_str_parse_round_trip() {
        for t in ALL {
            assert_eq!(MovementType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MovementType::parse("bogus"), None);
    }

    #[test]
    fn test_signed_direction() {
        assert_eq!(MovementType::Purchase.signed(dec!(10)), dec!(10));
        assert_eq!(MovementType::Sale.signed(dec!(10)), dec!(-10));
        assert_eq!(MovementType::Expired.signed(dec!(3)), dec!(-3));
        assert_eq!(MovementType::ReturnFromPatient.signed(dec!(3)), dec!(3));
    }
}

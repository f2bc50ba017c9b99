//! Movement log tests
//!
//! Tests for the append-only ledger view:
//! - Running stock totals reconstruct from signed entries
//! - Entries from one logical operation share a reference id
//! - Pagination arithmetic for ledger queries

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use pharmstock_backend::services::catalog::StockReconciliation;
use shared::{MovementType, PaginatedResponse, Pagination, PaginationMeta};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Replaying a day of signed movements lands on the same stock the
    /// aggregate carries.
    #[test]
    fn test_running_total_reconstruction() {
        let opening = dec!(120);
        let entries = [
            (MovementType::Sale, dec!(12)),
            (MovementType::Sale, dec!(8)),
            (MovementType::Purchase, dec!(200)),
            (MovementType::Expired, dec!(15)),
            (MovementType::Sample, dec!(2)),
        ];

        let mut running = opening;
        let mut stock_after = Vec::new();
        for (mt, qty) in entries {
            running += mt.signed(qty);
            stock_after.push(running);
        }

        assert_eq!(stock_after, vec![dec!(108), dec!(100), dec!(300), dec!(285), dec!(283)]);
        assert_eq!(running, dec!(283));
    }

    /// One deduction spanning three batches yields three ledger rows with
    /// one shared reference id.
    #[test]
    fn test_multi_batch_deduction_shares_reference() {
        let reference = Uuid::new_v4();
        let rows = [
            (Some(reference), dec!(-5)),
            (Some(reference), dec!(-5)),
            (Some(reference), dec!(-2)),
        ];

        let total: Decimal = rows.iter().map(|(_, qty)| *qty).sum();
        assert_eq!(total, dec!(-12));
        assert!(rows.iter().all(|(r, _)| *r == Some(reference)));
    }

    #[test]
    fn test_ledger_page_window() {
        let p = Pagination { page: 4, per_page: 25 };
        assert_eq!(p.offset(), 75);
        assert_eq!(p.limit(), 25);
    }

    #[test]
    fn test_ledger_page_meta() {
        let meta = PaginationMeta::new(Pagination { page: 1, per_page: 50 }, 101);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total_items, 101);
    }

    /// Consistency holds only when the aggregate, batch sum, and movement
    /// sum all agree on one snapshot's numbers.
    #[test]
    fn test_reconciliation_requires_all_three_to_agree() {
        let item = Uuid::new_v4();

        let ok = StockReconciliation::new(item, dec!(120), dec!(120), dec!(120));
        assert!(ok.consistent);

        let batch_drift = StockReconciliation::new(item, dec!(120), dec!(115), dec!(120));
        assert!(!batch_drift.consistent);

        let movement_drift = StockReconciliation::new(item, dec!(120), dec!(120), dec!(125));
        assert!(!movement_drift.consistent);
    }

    #[test]
    fn test_empty_ledger_page() {
        let response: PaginatedResponse<Decimal> = PaginatedResponse {
            data: vec![],
            pagination: PaginationMeta::new(Pagination::default(), 0),
        };
        assert_eq!(response.pagination.total_pages, 0);
        assert!(response.data.is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn movement_strategy() -> impl Strategy<Value = MovementType> {
        prop_oneof![
            Just(MovementType::Purchase),
            Just(MovementType::Sale),
            Just(MovementType::TransferIn),
            Just(MovementType::TransferOut),
            Just(MovementType::AdjustmentAdd),
            Just(MovementType::AdjustmentRemove),
            Just(MovementType::Expired),
            Just(MovementType::Damaged),
            Just(MovementType::Sample),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Final stock equals opening plus the sum of signed quantities,
        /// regardless of how inbound and outbound interleave.
        #[test]
        fn prop_ledger_sum_matches_final_stock(
            opening in quantity_strategy(),
            entries in prop::collection::vec((movement_strategy(), quantity_strategy()), 1..30)
        ) {
            let mut running = opening;
            for (mt, qty) in &entries {
                running += mt.signed(*qty);
            }

            let delta: Decimal = entries.iter().map(|(mt, qty)| mt.signed(*qty)).sum();
            prop_assert_eq!(running, opening + delta);
        }

        /// Page windows tile the ledger without gaps or overlaps.
        #[test]
        fn prop_pages_tile_without_gaps(per_page in 1u32..=100, pages in 1u32..=50) {
            let mut next_offset = 0i64;
            for page in 1..=pages {
                let p = Pagination { page, per_page };
                prop_assert_eq!(p.offset(), next_offset);
                next_offset += p.limit();
            }
        }

        /// Total pages always covers every item at the chosen page size.
        #[test]
        fn prop_meta_covers_all_items(total in 0u64..=10000, per_page in 1u32..=100) {
            let meta = PaginationMeta::new(Pagination { page: 1, per_page }, total);
            let capacity = u64::from(meta.total_pages) * u64::from(per_page);

            prop_assert!(capacity >= total);
            if meta.total_pages > 0 {
                let previous = u64::from(meta.total_pages - 1) * u64::from(per_page);
                prop_assert!(previous < total);
            }
        }
    }
}

//! Allocation engine
//!
//! The only path by which stock leaves the system. A deduction locks the
//! item row, plans a first-expiring-first-out draw across the live batches,
//! then applies every batch decrement, the movement rows, and the aggregate
//! update in one transaction. Callers pick the movement type; the algorithm
//! is identical for sales, transfers out, returns to vendor, damage,
//! samples, and removal adjustments.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{allocation_error, AppError, AppResult};
use crate::services::batch::{insert_batch_with_movement, AddBatchInput};
use crate::services::catalog::lock_item_stock;
use crate::services::movement::{insert_movement, NewMovement};
use shared::{plan_fefo, AvailableBatch, Movement, MovementType};

/// Shelf life assumed for synthetic adjustment batches when an item has no
/// active batch to augment.
const ADJUSTMENT_BATCH_SHELF_LIFE_DAYS: i64 = 365;

/// Allocation engine service
#[derive(Clone)]
pub struct AllocationService {
    db: PgPool,
}

/// Input for a stock deduction
#[derive(Debug, Deserialize)]
pub struct DeductStockInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub movement_type: MovementType,
    pub reason: String,
    pub performed_by: Uuid,
    /// Order/invoice/prescription reference from the calling system. A
    /// correlation id is generated when absent so multi-batch deductions
    /// stay linked.
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub is_addition: bool,
    pub reason: String,
    pub performed_by: Uuid,
}

impl AllocationService {
    /// Create a new AllocationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Deduct stock from an item, drawing from batches first-expiring-first-
    /// out. Fails fast with `InsufficientStock` before any write; a ledger
    /// drift discovered mid-plan aborts the whole transaction.
    ///
    /// Returns one movement per batch drawn, all sharing a reference id.
    pub async fn deduct_stock(
        &self,
        tenant_id: Uuid,
        input: DeductStockInput,
    ) -> AppResult<Vec<Movement>> {
        if input.movement_type.is_inbound() {
            return Err(AppError::validation(
                "movement_type",
                format!(
                    "'{}' adds stock; deductions need an outbound movement type",
                    input.movement_type
                ),
            ));
        }
        if input.reason.trim().is_empty() {
            return Err(AppError::validation("reason", "Reason cannot be empty"));
        }

        let mut tx = self.db.begin().await?;
        let stock = lock_item_stock(&mut tx, tenant_id, input.item_id).await?;

        let batches = sqlx::query_as::<_, (Uuid, String, NaiveDate, Decimal)>(
            r#"
            SELECT id, batch_number, expiry_date, current_quantity
            FROM stock_batches
            WHERE item_id = $1 AND is_active AND current_quantity > 0
            ORDER BY expiry_date, batch_number
            "#,
        )
        .bind(input.item_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|r| AvailableBatch {
            batch_id: r.0,
            batch_number: r.1,
            expiry_date: r.2,
            current_quantity: r.3,
        })
        .collect::<Vec<_>>();

        let draws = plan_fefo(&batches, input.quantity, stock)
            .map_err(|e| allocation_error(input.item_id, e))?;

        let reference_id = input.reference_id.unwrap_or_else(Uuid::new_v4);
        let mut running = stock;
        let mut movements = Vec::with_capacity(draws.len());
        for draw in &draws {
            sqlx::query(
                "UPDATE stock_batches SET current_quantity = current_quantity - $1 WHERE id = $2",
            )
            .bind(draw.quantity)
            .bind(draw.batch_id)
            .execute(&mut *tx)
            .await?;

            running -= draw.quantity;
            let movement = insert_movement(
                &mut tx,
                &NewMovement {
                    tenant_id,
                    item_id: input.item_id,
                    batch_id: Some(draw.batch_id),
                    movement_type: input.movement_type,
                    quantity: -draw.quantity,
                    performed_by: input.performed_by,
                    reason: input.reason.clone(),
                    reference_id: Some(reference_id),
                    reference_type: input.reference_type.clone(),
                    stock_after: running,
                },
            )
            .await?;
            movements.push(movement);
        }

        // One aggregate update for the whole deduction, in the same unit as
        // the batch and movement writes.
        sqlx::query("UPDATE items SET current_stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock - input.quantity)
            .bind(input.item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            item = %input.item_id,
            quantity = %input.quantity,
            movement_type = %input.movement_type,
            batches = movements.len(),
            "Deducted stock"
        );
        Ok(movements)
    }

    /// Manual stock adjustment. Additions augment the newest active batch
    /// (or create a synthetic adjustment batch when none exists); removals
    /// go through the normal FEFO deduction with `adjustment_remove`.
    pub async fn adjust_stock(
        &self,
        tenant_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<Vec<Movement>> {
        if !input.is_addition {
            return self
                .deduct_stock(
                    tenant_id,
                    DeductStockInput {
                        item_id: input.item_id,
                        quantity: input.quantity,
                        movement_type: MovementType::AdjustmentRemove,
                        reason: input.reason,
                        performed_by: input.performed_by,
                        reference_id: None,
                        reference_type: None,
                    },
                )
                .await;
        }

        if input.quantity <= Decimal::ZERO {
            return Err(AppError::validation("quantity", "Quantity must be positive"));
        }
        if input.reason.trim().is_empty() {
            return Err(AppError::validation("reason", "Reason cannot be empty"));
        }

        let mut tx = self.db.begin().await?;
        let stock = lock_item_stock(&mut tx, tenant_id, input.item_id).await?;

        let newest = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT id FROM stock_batches
            WHERE item_id = $1 AND is_active
            ORDER BY created_at DESC, batch_number DESC
            LIMIT 1
            "#,
        )
        .bind(input.item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let movement = if let Some((batch_id,)) = newest {
            // Grow both bounds so current <= initial keeps holding.
            sqlx::query(
                r#"
                UPDATE stock_batches
                SET initial_quantity = initial_quantity + $1,
                    current_quantity = current_quantity + $1
                WHERE id = $2
                "#,
            )
            .bind(input.quantity)
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

            let stock_after = stock + input.quantity;
            sqlx::query("UPDATE items SET current_stock = $1, updated_at = NOW() WHERE id = $2")
                .bind(stock_after)
                .bind(input.item_id)
                .execute(&mut *tx)
                .await?;

            insert_movement(
                &mut tx,
                &NewMovement {
                    tenant_id,
                    item_id: input.item_id,
                    batch_id: Some(batch_id),
                    movement_type: MovementType::AdjustmentAdd,
                    quantity: input.quantity,
                    performed_by: input.performed_by,
                    reason: input.reason.clone(),
                    reference_id: None,
                    reference_type: None,
                    stock_after,
                },
            )
            .await?
        } else {
            let today = Utc::now().date_naive();
            let added = insert_batch_with_movement(
                &mut tx,
                tenant_id,
                input.item_id,
                stock,
                &AddBatchInput {
                    batch_number: generate_adjustment_batch_number(),
                    manufacturing_date: today,
                    expiry_date: today + Duration::days(ADJUSTMENT_BATCH_SHELF_LIFE_DAYS),
                    quantity: input.quantity,
                    unit_price: Decimal::ZERO,
                    vendor_id: None,
                    purchase_order_id: None,
                    performed_by: input.performed_by,
                    reason: Some(input.reason.clone()),
                },
                MovementType::AdjustmentAdd,
                None,
            )
            .await?;
            added.movement
        };

        tx.commit().await?;

        tracing::info!(
            item = %input.item_id,
            quantity = %input.quantity,
            "Adjusted stock upward"
        );
        Ok(vec![movement])
    }
}

/// Batch numbers for synthetic adjustment batches: "ADJ-" plus a short
/// random suffix, unique enough within one item's ledger.
fn generate_adjustment_batch_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ADJ-{}", id[..8].to_uppercase())
}

//! Batch ledger service
//!
//! Every physical receipt of stock becomes one batch row. Batches only ever
//! shrink through the allocation engine or an expiry write-off; a depleted
//! batch stays on record for audit. Each mutation here commits the batch
//! change, the item aggregate update, and the movement row as one
//! transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::catalog::lock_item_stock;
use crate::services::movement::{insert_movement, NewMovement};
use shared::{
    validate_batch_dates, validate_batch_number, validate_non_negative_price,
    validate_positive_quantity, Batch, Movement, MovementType,
};

/// Batch ledger service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Database row for a batch
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    item_id: Uuid,
    batch_number: String,
    manufacturing_date: NaiveDate,
    expiry_date: NaiveDate,
    initial_quantity: Decimal,
    current_quantity: Decimal,
    unit_price: Decimal,
    vendor_id: Option<Uuid>,
    purchase_order_id: Option<Uuid>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            item_id: row.item_id,
            batch_number: row.batch_number,
            manufacturing_date: row.manufacturing_date,
            expiry_date: row.expiry_date,
            initial_quantity: row.initial_quantity,
            current_quantity: row.current_quantity,
            unit_price: row.unit_price,
            vendor_id: row.vendor_id,
            purchase_order_id: row.purchase_order_id,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const BATCH_COLUMNS: &str = "id, item_id, batch_number, manufacturing_date, expiry_date, \
     initial_quantity, current_quantity, unit_price, vendor_id, purchase_order_id, \
     is_active, created_at";

/// Input for adding a stock batch
#[derive(Debug, Deserialize)]
pub struct AddBatchInput {
    pub batch_number: String,
    pub manufacturing_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vendor_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub performed_by: Uuid,
    pub reason: Option<String>,
}

/// A batch together with the ledger entry that recorded its arrival
#[derive(Debug, Clone)]
pub struct BatchAdded {
    pub batch: Batch,
    pub movement: Movement,
}

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Add a batch of stock to an item.
    ///
    /// Emits a `purchase` movement when the batch is sourced from a purchase
    /// order, otherwise `initial_stock`.
    pub async fn add_batch(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        input: AddBatchInput,
    ) -> AppResult<BatchAdded> {
        let movement_type = if input.purchase_order_id.is_some() {
            MovementType::Purchase
        } else {
            MovementType::InitialStock
        };

        let mut tx = self.db.begin().await?;
        let stock = lock_item_stock(&mut tx, tenant_id, item_id).await?;
        let added = insert_batch_with_movement(
            &mut tx,
            tenant_id,
            item_id,
            stock,
            &input,
            movement_type,
            input.purchase_order_id,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            item = %item_id,
            batch = %added.batch.batch_number,
            quantity = %added.batch.initial_quantity,
            "Added stock batch"
        );
        Ok(added)
    }

    /// Write off the remaining quantity of an expired (or otherwise
    /// unusable) batch. The batch stays visible at zero quantity.
    pub async fn write_off_expired_batch(
        &self,
        tenant_id: Uuid,
        batch_id: Uuid,
        reason: String,
        performed_by: Uuid,
    ) -> AppResult<Movement> {
        let mut tx = self.db.begin().await?;

        // Resolve the owning item first; the item row lock serializes all
        // writers for that item, so the re-read below is stable.
        let item_id: Uuid = sqlx::query_scalar(
            r#"
            SELECT b.item_id
            FROM stock_batches b
            JOIN items i ON i.id = b.item_id
            WHERE b.id = $1 AND i.tenant_id = $2
            "#,
        )
        .bind(batch_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let stock = lock_item_stock(&mut tx, tenant_id, item_id).await?;

        let (batch_number, remaining): (String, Decimal) = sqlx::query_as(
            "SELECT batch_number, current_quantity FROM stock_batches WHERE id = $1",
        )
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        if remaining <= Decimal::ZERO {
            return Err(AppError::AlreadyDepleted(batch_number));
        }

        sqlx::query("UPDATE stock_batches SET current_quantity = 0 WHERE id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        let stock_after = stock - remaining;
        sqlx::query("UPDATE items SET current_stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock_after)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        let movement = insert_movement(
            &mut tx,
            &NewMovement {
                tenant_id,
                item_id,
                batch_id: Some(batch_id),
                movement_type: MovementType::Expired,
                quantity: -remaining,
                performed_by,
                reason,
                reference_id: None,
                reference_type: None,
                stock_after,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            item = %item_id,
            batch = %batch_number,
            written_off = %remaining,
            "Wrote off expired batch"
        );
        Ok(movement)
    }

    /// Active batches with remaining stock, in allocation order: ascending
    /// expiry date, ties broken by batch number.
    pub async fn list_available_batches_fefo(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT b.{}
            FROM stock_batches b
            JOIN items i ON i.id = b.item_id
            WHERE b.item_id = $1 AND i.tenant_id = $2
              AND b.is_active AND b.current_quantity > 0
            ORDER BY b.expiry_date, b.batch_number
            "#,
            BATCH_COLUMNS.replace(", ", ", b."),
        ))
        .bind(item_id)
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Batch::from).collect())
    }

    /// All batches of an item, including depleted ones, newest first
    pub async fn list_batches(&self, tenant_id: Uuid, item_id: Uuid) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT b.{}
            FROM stock_batches b
            JOIN items i ON i.id = b.item_id
            WHERE b.item_id = $1 AND i.tenant_id = $2
            ORDER BY b.created_at DESC
            "#,
            BATCH_COLUMNS.replace(", ", ", b."),
        ))
        .bind(item_id)
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Batch::from).collect())
    }
}

/// Insert a batch, bump the item aggregate, and write the arrival movement,
/// all on the caller's transaction. The caller must already hold the item
/// row lock; `cached_stock` is the locked value.
pub(crate) async fn insert_batch_with_movement(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    item_id: Uuid,
    cached_stock: Decimal,
    input: &AddBatchInput,
    movement_type: MovementType,
    reference_id: Option<Uuid>,
) -> AppResult<BatchAdded> {
    if let Err(msg) = validate_batch_number(&input.batch_number) {
        return Err(AppError::InvalidBatch(msg.to_string()));
    }
    if let Err(msg) = validate_positive_quantity(input.quantity) {
        return Err(AppError::InvalidBatch(msg.to_string()));
    }
    if let Err(msg) = validate_batch_dates(input.manufacturing_date, input.expiry_date) {
        return Err(AppError::InvalidBatch(msg.to_string()));
    }
    if let Err(msg) = validate_non_negative_price(input.unit_price) {
        return Err(AppError::InvalidBatch(msg.to_string()));
    }

    let duplicate: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM stock_batches WHERE item_id = $1 AND batch_number = $2)",
    )
    .bind(item_id)
    .bind(&input.batch_number)
    .fetch_one(&mut **tx)
    .await?;

    if duplicate {
        return Err(AppError::InvalidBatch(format!(
            "batch number '{}' already exists for this item",
            input.batch_number
        )));
    }

    let row = sqlx::query_as::<_, BatchRow>(&format!(
        r#"
        INSERT INTO stock_batches (item_id, batch_number, manufacturing_date, expiry_date,
                                   initial_quantity, current_quantity, unit_price,
                                   vendor_id, purchase_order_id)
        VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8)
        RETURNING {BATCH_COLUMNS}
        "#,
    ))
    .bind(item_id)
    .bind(&input.batch_number)
    .bind(input.manufacturing_date)
    .bind(input.expiry_date)
    .bind(input.quantity)
    .bind(input.unit_price)
    .bind(input.vendor_id)
    .bind(input.purchase_order_id)
    .fetch_one(&mut **tx)
    .await?;

    let stock_after = cached_stock + input.quantity;
    sqlx::query("UPDATE items SET current_stock = $1, updated_at = NOW() WHERE id = $2")
        .bind(stock_after)
        .bind(item_id)
        .execute(&mut **tx)
        .await?;

    let movement = insert_movement(
        tx,
        &NewMovement {
            tenant_id,
            item_id,
            batch_id: Some(row.id),
            movement_type,
            quantity: input.quantity,
            performed_by: input.performed_by,
            reason: input
                .reason
                .clone()
                .unwrap_or_else(|| "batch received".to_string()),
            reference_id,
            reference_type: reference_id.map(|_| "purchase_order".to_string()),
            stock_after,
        },
    )
    .await?;

    Ok(BatchAdded {
        batch: row.into(),
        movement,
    })
}

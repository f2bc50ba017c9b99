//! Stock movement ledger service
//!
//! The ledger is write-once: rows are inserted inside the transactions of the
//! batch, allocation, and procurement services, and nothing ever updates or
//! deletes them. This module owns the insert helper and the read queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{
    DateRange, Movement, MovementType, PaginatedResponse, Pagination, PaginationMeta,
};

/// Movement ledger service for reading stock history
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

/// Database row for a movement
#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: i64,
    tenant_id: Uuid,
    item_id: Uuid,
    batch_id: Option<Uuid>,
    movement_type: String,
    quantity: Decimal,
    performed_by: Uuid,
    reason: String,
    reference_id: Option<Uuid>,
    reference_type: Option<String>,
    stock_after: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::parse(&row.movement_type).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "unknown movement type '{}' in ledger row {}",
                row.movement_type,
                row.id
            ))
        })?;
        Ok(Movement {
            id: row.id,
            tenant_id: row.tenant_id,
            item_id: row.item_id,
            batch_id: row.batch_id,
            movement_type,
            quantity: row.quantity,
            performed_by: row.performed_by,
            reason: row.reason,
            reference_id: row.reference_id,
            reference_type: row.reference_type,
            stock_after: row.stock_after,
            created_at: row.created_at,
        })
    }
}

/// A ledger entry about to be written. `quantity` is already signed.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: Uuid,
    pub item_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub performed_by: Uuid,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub stock_after: Decimal,
}

/// Append one row to the ledger inside the caller's transaction.
pub(crate) async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    entry: &NewMovement,
) -> AppResult<Movement> {
    let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        r#"
        INSERT INTO stock_movements (
            tenant_id, item_id, batch_id, movement_type, quantity,
            performed_by, reason, reference_id, reference_type, stock_after
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, created_at
        "#,
    )
    .bind(entry.tenant_id)
    .bind(entry.item_id)
    .bind(entry.batch_id)
    .bind(entry.movement_type.as_str())
    .bind(entry.quantity)
    .bind(entry.performed_by)
    .bind(&entry.reason)
    .bind(entry.reference_id)
    .bind(&entry.reference_type)
    .bind(entry.stock_after)
    .fetch_one(&mut **tx)
    .await?;

    Ok(Movement {
        id,
        tenant_id: entry.tenant_id,
        item_id: entry.item_id,
        batch_id: entry.batch_id,
        movement_type: entry.movement_type,
        quantity: entry.quantity,
        performed_by: entry.performed_by,
        reason: entry.reason.clone(),
        reference_id: entry.reference_id,
        reference_type: entry.reference_type.clone(),
        stock_after: entry.stock_after,
        created_at,
    })
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the movement history for one item, newest first
    pub async fn list_by_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Movement>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_movements WHERE tenant_id = $1 AND item_id = $2",
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, tenant_id, item_id, batch_id, movement_type, quantity,
                   performed_by, reason, reference_id, reference_type, stock_after, created_at
            FROM stock_movements
            WHERE tenant_id = $1 AND item_id = $2
            ORDER BY id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(item_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(Movement::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total as u64),
        })
    }

    /// Get all movements for a tenant in a date range (inclusive)
    pub async fn list_by_date_range(
        &self,
        tenant_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, tenant_id, item_id, batch_id, movement_type, quantity,
                   performed_by, reason, reference_id, reference_type, stock_after, created_at
            FROM stock_movements
            WHERE tenant_id = $1
              AND created_at >= $2::date
              AND created_at < ($3::date + INTERVAL '1 day')
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }

    /// Movements correlated by a shared reference id (e.g., all rows of one
    /// multi-batch deduction)
    pub async fn list_by_reference(
        &self,
        tenant_id: Uuid,
        reference_id: Uuid,
    ) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, tenant_id, item_id, batch_id, movement_type, quantity,
                   performed_by, reason, reference_id, reference_type, stock_after, created_at
            FROM stock_movements
            WHERE tenant_id = $1 AND reference_id = $2
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(reference_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }
}

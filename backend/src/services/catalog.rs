//! Item catalog service
//!
//! Master records per SKU per tenant. Stock fields (`current_stock`) are
//! read-only here: only the batch ledger and the allocation engine write
//! them. Items are deactivated, never deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{validate_non_negative_price, validate_sku, Item};

/// Catalog service for managing item master records
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Database row for an item
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    tenant_id: Uuid,
    sku: String,
    name: String,
    unit: String,
    purchase_price: Decimal,
    selling_price: Decimal,
    reorder_level: Decimal,
    reorder_quantity: Decimal,
    current_stock: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            tenant_id: row.tenant_id,
            sku: row.sku,
            name: row.name,
            unit: row.unit,
            purchase_price: row.purchase_price,
            selling_price: row.selling_price,
            reorder_level: row.reorder_level,
            reorder_quantity: row.reorder_quantity,
            current_stock: row.current_stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ITEM_COLUMNS: &str = "id, tenant_id, sku, name, unit, purchase_price, selling_price, \
     reorder_level, reorder_quantity, current_stock, is_active, created_at, updated_at";

/// Input for creating an item
#[derive(Debug, Deserialize)]
pub struct CreateItemInput {
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub reorder_level: Decimal,
    pub reorder_quantity: Decimal,
}

/// Input for updating an item. Stock fields are deliberately absent.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemInput {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub reorder_level: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Result of checking one item's cached aggregate against the ledger
#[derive(Debug, Clone, Serialize)]
pub struct StockReconciliation {
    pub item_id: Uuid,
    pub cached_stock: Decimal,
    /// Sum of `current_quantity` over the item's active batches
    pub batch_total: Decimal,
    /// Sum of signed movement deltas for the item
    pub movement_total: Decimal,
    pub consistent: bool,
}

impl StockReconciliation {
    /// Consistency holds when the cached aggregate, the batch sum, and the
    /// movement sum all agree.
    pub fn new(
        item_id: Uuid,
        cached_stock: Decimal,
        batch_total: Decimal,
        movement_total: Decimal,
    ) -> Self {
        let consistent = cached_stock == batch_total && cached_stock == movement_total;
        Self {
            item_id,
            cached_stock,
            batch_total,
            movement_total,
            consistent,
        }
    }
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an item master record with zero stock
    pub async fn create_item(&self, tenant_id: Uuid, input: CreateItemInput) -> AppResult<Item> {
        if let Err(msg) = validate_sku(&input.sku) {
            return Err(AppError::validation("sku", msg));
        }
        if input.name.trim().is_empty() {
            return Err(AppError::validation("name", "Item name cannot be empty"));
        }
        for (field, price) in [
            ("purchase_price", input.purchase_price),
            ("selling_price", input.selling_price),
        ] {
            if let Err(msg) = validate_non_negative_price(price) {
                return Err(AppError::validation(field, msg));
            }
        }
        if input.reorder_level < Decimal::ZERO || input.reorder_quantity < Decimal::ZERO {
            return Err(AppError::validation(
                "reorder_level",
                "Reorder fields cannot be negative",
            ));
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE tenant_id = $1 AND sku = $2)",
        )
        .bind(tenant_id)
        .bind(&input.sku)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(AppError::DuplicateSku(input.sku));
        }

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (tenant_id, sku, name, unit, purchase_price, selling_price,
                               reorder_level, reorder_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(tenant_id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(&input.unit)
        .bind(input.purchase_price)
        .bind(input.selling_price)
        .bind(input.reorder_level)
        .bind(input.reorder_quantity)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(tenant = %tenant_id, sku = %row.sku, "Created catalog item");
        Ok(row.into())
    }

    /// Update non-stock fields of an item
    pub async fn update_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<Item> {
        let existing = self.get_item(tenant_id, item_id).await?;

        let name = input.name.unwrap_or(existing.name);
        if name.trim().is_empty() {
            return Err(AppError::validation("name", "Item name cannot be empty"));
        }
        let unit = input.unit.unwrap_or(existing.unit);
        let purchase_price = input.purchase_price.unwrap_or(existing.purchase_price);
        let selling_price = input.selling_price.unwrap_or(existing.selling_price);
        let reorder_level = input.reorder_level.unwrap_or(existing.reorder_level);
        let reorder_quantity = input.reorder_quantity.unwrap_or(existing.reorder_quantity);
        let is_active = input.is_active.unwrap_or(existing.is_active);

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items
            SET name = $1, unit = $2, purchase_price = $3, selling_price = $4,
                reorder_level = $5, reorder_quantity = $6, is_active = $7, updated_at = NOW()
            WHERE id = $8 AND tenant_id = $9
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(&name)
        .bind(&unit)
        .bind(purchase_price)
        .bind(selling_price)
        .bind(reorder_level)
        .bind(reorder_quantity)
        .bind(is_active)
        .bind(item_id)
        .bind(tenant_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Get an item by id
    pub async fn get_item(&self, tenant_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND tenant_id = $2",
        ))
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into())
    }

    /// List all items for a tenant
    pub async fn list_items(&self, tenant_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 ORDER BY sku",
        ))
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Active items at or below their reorder level
    pub async fn get_low_stock_items(&self, tenant_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE tenant_id = $1 AND is_active AND current_stock <= reorder_level
            ORDER BY sku
            "#,
        ))
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Active items with no stock left
    pub async fn get_out_of_stock_items(&self, tenant_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE tenant_id = $1 AND is_active AND current_stock <= 0
            ORDER BY sku
            "#,
        ))
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Maintenance: compare the cached aggregate against the batch ledger and
    /// the movement log. An inconsistent item indicates a prior atomicity
    /// failure and is reported loudly; nothing is modified.
    pub async fn reconcile_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<StockReconciliation> {
        // All three reads must come from one snapshot, or a write committing
        // between them shows up as phantom drift.
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let cached_stock: Decimal = sqlx::query_scalar(
            "SELECT current_stock FROM items WHERE id = $1 AND tenant_id = $2",
        )
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        let batch_total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(current_quantity), 0)
            FROM stock_batches
            WHERE item_id = $1 AND is_active
            "#,
        )
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        let movement_total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_movements WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let reconciliation =
            StockReconciliation::new(item_id, cached_stock, batch_total, movement_total);
        if !reconciliation.consistent {
            tracing::error!(
                item = %item_id,
                cached = %cached_stock,
                batches = %batch_total,
                movements = %movement_total,
                "Ledger inconsistency detected"
            );
        }

        Ok(reconciliation)
    }

    /// Maintenance: reset the cached aggregate to the batch ledger truth.
    /// Runs under the same per-item lock as the write path.
    pub async fn rebuild_item_stock(&self, tenant_id: Uuid, item_id: Uuid) -> AppResult<Decimal> {
        let mut tx = self.db.begin().await?;

        lock_item_stock(&mut tx, tenant_id, item_id).await?;

        let batch_total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(current_quantity), 0)
            FROM stock_batches
            WHERE item_id = $1 AND is_active
            "#,
        )
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE items SET current_stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(batch_total)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::warn!(item = %item_id, stock = %batch_total, "Rebuilt cached stock from batches");
        Ok(batch_total)
    }

}

/// Lock an item's row for the duration of the surrounding transaction and
/// return its current cached stock. This is the per-item serialization point
/// for every stock-mutating operation: writers to the same item queue on the
/// row lock, writers to different items proceed in parallel.
pub(crate) async fn lock_item_stock(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    tenant_id: Uuid,
    item_id: Uuid,
) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT current_stock FROM items WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(item_id)
    .bind(tenant_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Item".to_string()))
}

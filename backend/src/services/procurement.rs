//! Procurement workflow service
//!
//! Vendors, purchase orders, and goods receipt. Status transitions are
//! guarded by the shared state machine; receiving goods creates stock
//! batches through the batch ledger so the movement log stays complete.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::ProcurementConfig;
use crate::error::{AppError, AppResult};
use crate::services::batch::{insert_batch_with_movement, AddBatchInput, BatchAdded};
use crate::services::catalog::lock_item_stock;
use shared::{
    line_total, validate_percent, validate_positive_quantity, validate_vendor_code,
    MovementType, PurchaseOrder, PurchaseOrderAction, PurchaseOrderLine, PurchaseOrderStatus,
    ReceiveIssue, Vendor,
};

/// Procurement service for vendors and purchase orders
#[derive(Clone)]
pub struct ProcurementService {
    db: PgPool,
    config: ProcurementConfig,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct VendorRow {
    id: Uuid,
    tenant_id: Uuid,
    code: String,
    name: String,
    contact_person: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    payment_terms_days: i32,
    credit_limit: Option<Decimal>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Vendor {
            id: row.id,
            tenant_id: row.tenant_id,
            code: row.code,
            name: row.name,
            contact_person: row.contact_person,
            phone: row.phone,
            email: row.email,
            address: row.address,
            payment_terms_days: row.payment_terms_days,
            credit_limit: row.credit_limit,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    tenant_id: Uuid,
    po_number: String,
    vendor_id: Uuid,
    status: String,
    ordered_date: NaiveDate,
    expected_date: Option<NaiveDate>,
    approved_by: Option<Uuid>,
    approval_notes: Option<String>,
    subtotal: Decimal,
    tax_total: Decimal,
    total: Decimal,
    cancelled_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseOrderRow> for PurchaseOrder {
    type Error = AppError;

    fn try_from(row: PurchaseOrderRow) -> Result<Self, Self::Error> {
        let status = PurchaseOrderStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "unknown purchase order status '{}' on {}",
                row.status,
                row.po_number
            ))
        })?;
        Ok(PurchaseOrder {
            id: row.id,
            tenant_id: row.tenant_id,
            po_number: row.po_number,
            vendor_id: row.vendor_id,
            status,
            ordered_date: row.ordered_date,
            expected_date: row.expected_date,
            approved_by: row.approved_by,
            approval_notes: row.approval_notes,
            subtotal: row.subtotal,
            tax_total: row.tax_total,
            total: row.total,
            cancelled_reason: row.cancelled_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    purchase_order_id: Uuid,
    item_id: Uuid,
    ordered_quantity: Decimal,
    received_quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
    tax_percent: Decimal,
    line_total: Decimal,
    created_at: DateTime<Utc>,
}

impl From<LineRow> for PurchaseOrderLine {
    fn from(row: LineRow) -> Self {
        PurchaseOrderLine {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            item_id: row.item_id,
            ordered_quantity: row.ordered_quantity,
            received_quantity: row.received_quantity,
            unit_price: row.unit_price,
            discount_percent: row.discount_percent,
            tax_percent: row.tax_percent,
            line_total: row.line_total,
            created_at: row.created_at,
        }
    }
}

const VENDOR_COLUMNS: &str = "id, tenant_id, code, name, contact_person, phone, email, address, \
     payment_terms_days, credit_limit, is_active, created_at, updated_at";

const PO_COLUMNS: &str = "id, tenant_id, po_number, vendor_id, status, ordered_date, \
     expected_date, approved_by, approval_notes, subtotal, tax_total, total, cancelled_reason, \
     created_at, updated_at";

const LINE_COLUMNS: &str = "id, purchase_order_id, item_id, ordered_quantity, received_quantity, \
     unit_price, discount_percent, tax_percent, line_total, created_at";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input for creating a vendor
#[derive(Debug, Deserialize)]
pub struct CreateVendorInput {
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub payment_terms_days: Option<i32>,
    pub credit_limit: Option<Decimal>,
}

/// Input for updating a vendor
#[derive(Debug, Default, Deserialize)]
pub struct UpdateVendorInput {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub payment_terms_days: Option<i32>,
    pub credit_limit: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub vendor_id: Uuid,
    pub expected_date: Option<NaiveDate>,
}

/// Input for adding a line to a draft purchase order
#[derive(Debug, Deserialize)]
pub struct AddLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
}

/// Input for receiving goods against a sent purchase order
#[derive(Debug, Deserialize)]
pub struct ReceiveGoodsInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub batch_number: String,
    pub manufacturing_date: NaiveDate,
    pub expiry_date: NaiveDate,
    /// Actual unit cost; defaults to the line's ordered price
    pub unit_price: Option<Decimal>,
    pub performed_by: Uuid,
}

/// A purchase order with its lines
#[derive(Debug, Clone)]
pub struct PurchaseOrderWithLines {
    pub order: PurchaseOrder,
    pub lines: Vec<PurchaseOrderLine>,
}

/// Outcome of one goods receipt
#[derive(Debug, Clone)]
pub struct GoodsReceipt {
    pub status: PurchaseOrderStatus,
    pub batch: shared::Batch,
    pub movement: shared::Movement,
}

impl ProcurementService {
    /// Create a new ProcurementService instance
    pub fn new(db: PgPool, config: ProcurementConfig) -> Self {
        Self { db, config }
    }

    // -- Vendors ------------------------------------------------------------

    /// Create a vendor record
    pub async fn create_vendor(&self, tenant_id: Uuid, input: CreateVendorInput) -> AppResult<Vendor> {
        if let Err(msg) = validate_vendor_code(&input.code) {
            return Err(AppError::validation("code", msg));
        }
        if input.name.trim().is_empty() {
            return Err(AppError::validation("name", "Vendor name cannot be empty"));
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM vendors WHERE tenant_id = $1 AND code = $2)",
        )
        .bind(tenant_id)
        .bind(&input.code)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry(format!(
                "vendor code '{}'",
                input.code
            )));
        }

        let row = sqlx::query_as::<_, VendorRow>(&format!(
            r#"
            INSERT INTO vendors (tenant_id, code, name, contact_person, phone, email, address,
                                 payment_terms_days, credit_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {VENDOR_COLUMNS}
            "#,
        ))
        .bind(tenant_id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(
            input
                .payment_terms_days
                .unwrap_or(self.config.default_payment_terms_days),
        )
        .bind(input.credit_limit)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(tenant = %tenant_id, code = %row.code, "Created vendor");
        Ok(row.into())
    }

    /// List all vendors for a tenant
    pub async fn list_vendors(&self, tenant_id: Uuid) -> AppResult<Vec<Vendor>> {
        let rows = sqlx::query_as::<_, VendorRow>(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors WHERE tenant_id = $1 ORDER BY code",
        ))
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Vendor::from).collect())
    }

    /// Update a vendor
    pub async fn update_vendor(
        &self,
        tenant_id: Uuid,
        vendor_id: Uuid,
        input: UpdateVendorInput,
    ) -> AppResult<Vendor> {
        let existing = sqlx::query_as::<_, VendorRow>(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1 AND tenant_id = $2",
        ))
        .bind(vendor_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vendor".to_string()))?;

        let name = input.name.unwrap_or(existing.name);
        if name.trim().is_empty() {
            return Err(AppError::validation("name", "Vendor name cannot be empty"));
        }

        let row = sqlx::query_as::<_, VendorRow>(&format!(
            r#"
            UPDATE vendors
            SET name = $1, contact_person = $2, phone = $3, email = $4, address = $5,
                payment_terms_days = $6, credit_limit = $7, is_active = $8, updated_at = NOW()
            WHERE id = $9
            RETURNING {VENDOR_COLUMNS}
            "#,
        ))
        .bind(&name)
        .bind(input.contact_person.or(existing.contact_person))
        .bind(input.phone.or(existing.phone))
        .bind(input.email.or(existing.email))
        .bind(input.address.or(existing.address))
        .bind(input.payment_terms_days.unwrap_or(existing.payment_terms_days))
        .bind(input.credit_limit.or(existing.credit_limit))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(vendor_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    // -- Purchase orders ----------------------------------------------------

    /// Create a draft purchase order for a vendor
    pub async fn create_purchase_order(
        &self,
        tenant_id: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        let vendor_active: bool = sqlx::query_scalar(
            "SELECT is_active FROM vendors WHERE id = $1 AND tenant_id = $2",
        )
        .bind(input.vendor_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vendor".to_string()))?;

        if !vendor_active {
            return Err(AppError::validation(
                "vendor_id",
                "Cannot order from an inactive vendor",
            ));
        }

        // Numbering races with concurrent creators; the unique constraint
        // on (tenant_id, po_number) rejects the loser, who regenerates from
        // the fresh count and tries once more.
        let mut retried = false;
        let row = loop {
            let po_number = self.generate_po_number(tenant_id).await?;

            let inserted = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
                r#"
                INSERT INTO purchase_orders (tenant_id, po_number, vendor_id, expected_date)
                VALUES ($1, $2, $3, $4)
                RETURNING {PO_COLUMNS}
                "#,
            ))
            .bind(tenant_id)
            .bind(&po_number)
            .bind(input.vendor_id)
            .bind(input.expected_date)
            .fetch_one(&self.db)
            .await;

            match inserted {
                Ok(row) => break row,
                Err(sqlx::Error::Database(db_err))
                    if !retried
                        && db_err.constraint() == Some("purchase_orders_tenant_number_unique") =>
                {
                    tracing::warn!(tenant = %tenant_id, po = %po_number, "Order number taken, regenerating");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(tenant = %tenant_id, po = %row.po_number, "Created purchase order");
        row.try_into()
    }

    /// Generate a purchase order number, "PO-YYYY-NNNN" by default,
    /// sequential per tenant and year.
    async fn generate_po_number(&self, tenant_id: Uuid) -> AppResult<String> {
        let prefix = &self.config.po_number_prefix;
        let year = Utc::now().year();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchase_orders WHERE tenant_id = $1 AND po_number LIKE $2",
        )
        .bind(tenant_id)
        .bind(format!("{prefix}-{year}-%"))
        .fetch_one(&self.db)
        .await?;

        Ok(format_po_number(prefix, year, count + 1))
    }

    /// Add a line to a draft purchase order and recompute its totals
    pub async fn add_line(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
        input: AddLineInput,
    ) -> AppResult<PurchaseOrderWithLines> {
        if let Err(msg) = validate_positive_quantity(input.quantity) {
            return Err(AppError::validation("quantity", msg));
        }
        for (field, percent) in [
            ("discount_percent", input.discount_percent),
            ("tax_percent", input.tax_percent),
        ] {
            if let Err(msg) = validate_percent(percent) {
                return Err(AppError::validation(field, msg));
            }
        }

        let mut tx = self.db.begin().await?;
        let order = lock_purchase_order(&mut tx, tenant_id, po_id).await?;
        order.status.ensure(PurchaseOrderAction::AddLine)?;

        let item_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(input.item_id)
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        if !item_exists {
            return Err(AppError::NotFound("Item".to_string()));
        }

        // One line per item per order, so goods receipt resolves a line
        // unambiguously.
        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM purchase_order_lines \
             WHERE purchase_order_id = $1 AND item_id = $2)",
        )
        .bind(po_id)
        .bind(input.item_id)
        .fetch_one(&mut *tx)
        .await?;

        if duplicate {
            return Err(AppError::DuplicateEntry(format!(
                "item {} already has a line on order {}",
                input.item_id, order.po_number
            )));
        }

        let total = line_total(
            input.quantity,
            input.unit_price,
            input.discount_percent,
            input.tax_percent,
        );

        sqlx::query(
            r#"
            INSERT INTO purchase_order_lines
                (purchase_order_id, item_id, ordered_quantity, unit_price,
                 discount_percent, tax_percent, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(po_id)
        .bind(input.item_id)
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(input.discount_percent)
        .bind(input.tax_percent)
        .bind(total)
        .execute(&mut *tx)
        .await?;

        recompute_totals(&mut tx, po_id).await?;
        tx.commit().await?;

        self.get_purchase_order(tenant_id, po_id).await
    }

    /// Submit a draft purchase order for approval
    pub async fn submit_for_approval(&self, tenant_id: Uuid, po_id: Uuid) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let order = lock_purchase_order(&mut tx, tenant_id, po_id).await?;
        order.status.ensure(PurchaseOrderAction::SubmitForApproval)?;

        let line_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchase_order_lines WHERE purchase_order_id = $1",
        )
        .bind(po_id)
        .fetch_one(&mut *tx)
        .await?;

        if line_count == 0 {
            return Err(AppError::EmptyOrder);
        }

        let updated =
            set_status(&mut tx, po_id, PurchaseOrderStatus::PendingApproval).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Approve a pending purchase order
    pub async fn approve(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
        approver_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let order = lock_purchase_order(&mut tx, tenant_id, po_id).await?;
        order.status.ensure(PurchaseOrderAction::Approve)?;

        sqlx::query(
            "UPDATE purchase_orders SET approved_by = $1, approval_notes = $2 WHERE id = $3",
        )
        .bind(approver_id)
        .bind(&notes)
        .bind(po_id)
        .execute(&mut *tx)
        .await?;

        let updated = set_status(&mut tx, po_id, PurchaseOrderStatus::Approved).await?;
        tx.commit().await?;

        tracing::info!(po = %updated.po_number, approver = %approver_id, "Approved purchase order");
        Ok(updated)
    }

    /// Mark an approved purchase order as sent to the vendor. Actual
    /// transmission is the caller's concern.
    pub async fn send(&self, tenant_id: Uuid, po_id: Uuid) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let order = lock_purchase_order(&mut tx, tenant_id, po_id).await?;
        order.status.ensure(PurchaseOrderAction::Send)?;

        let updated = set_status(&mut tx, po_id, PurchaseOrderStatus::Sent).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Receive goods against a sent or partially received purchase order.
    ///
    /// Creates the stock batch (which emits the `purchase` movement and bumps
    /// the item aggregate), advances the line's received quantity, and moves
    /// the order to `received` when every line is complete — all in one
    /// transaction.
    pub async fn receive_goods(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
        input: ReceiveGoodsInput,
    ) -> AppResult<GoodsReceipt> {
        let mut tx = self.db.begin().await?;
        let order = lock_purchase_order(&mut tx, tenant_id, po_id).await?;
        order.status.ensure(PurchaseOrderAction::ReceiveGoods)?;

        let line: PurchaseOrderLine = sqlx::query_as::<_, LineRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM purchase_order_lines \
             WHERE purchase_order_id = $1 AND item_id = $2",
        ))
        .bind(po_id)
        .bind(input.item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order line".to_string()))?
        .into();

        match line.check_receive(input.quantity) {
            Ok(()) => {}
            Err(ReceiveIssue::NotPositive) => {
                return Err(AppError::validation("quantity", "Quantity must be positive"));
            }
            Err(ReceiveIssue::ExceedsRemaining { remaining }) => {
                return Err(AppError::OverReceipt {
                    item: input.item_id,
                    remaining: remaining.to_string(),
                    requested: input.quantity.to_string(),
                });
            }
        }

        let stock = lock_item_stock(&mut tx, tenant_id, input.item_id).await?;
        let added: BatchAdded = insert_batch_with_movement(
            &mut tx,
            tenant_id,
            input.item_id,
            stock,
            &AddBatchInput {
                batch_number: input.batch_number.clone(),
                manufacturing_date: input.manufacturing_date,
                expiry_date: input.expiry_date,
                quantity: input.quantity,
                unit_price: input.unit_price.unwrap_or(line.unit_price),
                vendor_id: Some(order.vendor_id),
                purchase_order_id: Some(po_id),
                performed_by: input.performed_by,
                reason: Some(format!("goods receipt against {}", order.po_number)),
            },
            MovementType::Purchase,
            Some(po_id),
        )
        .await?;

        sqlx::query(
            "UPDATE purchase_order_lines SET received_quantity = received_quantity + $1 \
             WHERE id = $2",
        )
        .bind(input.quantity)
        .bind(line.id)
        .execute(&mut *tx)
        .await?;

        let all_complete: bool = sqlx::query_scalar(
            "SELECT BOOL_AND(received_quantity >= ordered_quantity) \
             FROM purchase_order_lines WHERE purchase_order_id = $1",
        )
        .bind(po_id)
        .fetch_one(&mut *tx)
        .await?;

        let updated = set_status(
            &mut tx,
            po_id,
            PurchaseOrderStatus::after_receipt(all_complete),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            po = %updated.po_number,
            item = %input.item_id,
            quantity = %input.quantity,
            status = %updated.status,
            "Received goods"
        );
        Ok(GoodsReceipt {
            status: updated.status,
            batch: added.batch,
            movement: added.movement,
        })
    }

    /// Cancel a purchase order. Goods already received stay in stock.
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
        reason: String,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let order = lock_purchase_order(&mut tx, tenant_id, po_id).await?;
        order.status.ensure(PurchaseOrderAction::Cancel)?;

        sqlx::query("UPDATE purchase_orders SET cancelled_reason = $1 WHERE id = $2")
            .bind(&reason)
            .bind(po_id)
            .execute(&mut *tx)
            .await?;

        let updated = set_status(&mut tx, po_id, PurchaseOrderStatus::Cancelled).await?;
        tx.commit().await?;

        tracing::info!(po = %updated.po_number, "Cancelled purchase order");
        Ok(updated)
    }

    /// Get a purchase order with its lines
    pub async fn get_purchase_order(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
    ) -> AppResult<PurchaseOrderWithLines> {
        let order: PurchaseOrder = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE id = $1 AND tenant_id = $2",
        ))
        .bind(po_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?
        .try_into()?;

        let lines = sqlx::query_as::<_, LineRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM purchase_order_lines \
             WHERE purchase_order_id = $1 ORDER BY created_at",
        ))
        .bind(po_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(PurchaseOrderLine::from)
        .collect();

        Ok(PurchaseOrderWithLines { order, lines })
    }

    /// List purchase orders for a tenant, newest first
    pub async fn list_purchase_orders(&self, tenant_id: Uuid) -> AppResult<Vec<PurchaseOrder>> {
        let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE tenant_id = $1 \
             ORDER BY created_at DESC",
        ))
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PurchaseOrder::try_from).collect()
    }
}

/// Format a purchase order number from its parts, zero-padded to four
/// digits (e.g., "PO-2026-0042").
pub fn format_po_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

/// Lock a purchase order row for the surrounding transaction. Serializes
/// concurrent transitions and receipts against the same order.
async fn lock_purchase_order(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    po_id: Uuid,
) -> AppResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {PO_COLUMNS} FROM purchase_orders \
         WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    ))
    .bind(po_id)
    .bind(tenant_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?
    .try_into()
}

async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    po_id: Uuid,
    status: PurchaseOrderStatus,
) -> AppResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "UPDATE purchase_orders SET status = $1, updated_at = NOW() \
         WHERE id = $2 RETURNING {PO_COLUMNS}",
    ))
    .bind(status.as_str())
    .bind(po_id)
    .fetch_one(&mut **tx)
    .await?
    .try_into()
}

/// Recompute the order's subtotal, tax, and total from its lines.
async fn recompute_totals(tx: &mut Transaction<'_, Postgres>, po_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders po
        SET subtotal = totals.subtotal,
            tax_total = totals.total - totals.subtotal,
            total = totals.total,
            updated_at = NOW()
        FROM (
            SELECT
                COALESCE(SUM(ordered_quantity * unit_price * (100 - discount_percent) / 100), 0)
                    AS subtotal,
                COALESCE(SUM(line_total), 0) AS total
            FROM purchase_order_lines
            WHERE purchase_order_id = $1
        ) AS totals
        WHERE po.id = $1
        "#,
    )
    .bind(po_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

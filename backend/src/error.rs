//! Error handling for the PharmStock core
//!
//! Every failure is reported synchronously to the caller as a typed error.
//! Nothing here is retried automatically; the only transient condition in
//! the system is row-lock contention, and that lives inside Postgres.

use thiserror::Error;

use shared::{AllocationError, PurchaseOrderAction, PurchaseOrderStatus, TransitionError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Catalog errors
    #[error("SKU '{0}' already exists for this tenant")]
    DuplicateSku(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // Batch ledger errors
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Batch '{0}' is already depleted")]
    AlreadyDepleted(String),

    // Allocation errors
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: String, available: String },

    /// Fatal: the cached item aggregate disagrees with the batch ledger.
    /// Indicates a prior atomicity failure; the operation that hit it has
    /// been rolled back in full.
    #[error("Ledger inconsistency on item {item}: {detail}")]
    LedgerInconsistency { item: uuid::Uuid, detail: String },

    // Procurement errors
    #[error("Purchase order has no lines")]
    EmptyOrder,

    #[error("Over-receipt: line for item {item} has {remaining} remaining, got {requested}")]
    OverReceipt {
        item: uuid::Uuid,
        remaining: String,
        requested: String,
    },

    #[error("Invalid transition: cannot {action} a purchase order in {from} state")]
    InvalidTransition {
        from: PurchaseOrderStatus,
        action: PurchaseOrderAction,
    },

    // General errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for callers that map errors to
    /// user-facing messaging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::DuplicateSku(_) => "DUPLICATE_SKU",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::InvalidBatch(_) => "INVALID_BATCH",
            AppError::AlreadyDepleted(_) => "ALREADY_DEPLETED",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::LedgerInconsistency { .. } => "LEDGER_INCONSISTENCY",
            AppError::EmptyOrder => "EMPTY_ORDER",
            AppError::OverReceipt { .. } => "OVER_RECEIPT",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidTransition {
            from: err.from,
            action: err.action,
        }
    }
}

/// Allocation planner failures carry the item they were planned for so the
/// drift case can be reported against it.
pub(crate) fn allocation_error(item: uuid::Uuid, err: AllocationError) -> AppError {
    match err {
        AllocationError::InvalidQuantity(q) => {
            AppError::validation("quantity", format!("quantity must be positive, got {q}"))
        }
        AllocationError::InsufficientStock {
            requested,
            available,
        } => AppError::InsufficientStock {
            requested: requested.to_string(),
            available: available.to_string(),
        },
        AllocationError::LedgerDrift { shortfall } => AppError::LedgerInconsistency {
            item,
            detail: format!("batches short by {shortfall} against cached stock"),
        },
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;

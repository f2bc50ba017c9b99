//! Reorder advisor
//!
//! Read-only scan over the catalog's cached aggregates. Items at or below
//! their reorder level become suggestions priced from the item's purchase
//! price; nothing is ordered automatically.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::catalog::CatalogService;
use shared::ReorderSuggestion;

/// Reorder advisory service
#[derive(Clone)]
pub struct ReorderService {
    catalog: CatalogService,
}

impl ReorderService {
    /// Create a new ReorderService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            catalog: CatalogService::new(db),
        }
    }

    /// Suggest reorders for every active item at or below its reorder level.
    /// Inactive items never appear, even when depleted.
    pub async fn get_reorder_suggestions(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<ReorderSuggestion>> {
        let low_stock = self.catalog.get_low_stock_items(tenant_id).await?;

        let suggestions: Vec<ReorderSuggestion> = low_stock
            .iter()
            .filter_map(ReorderSuggestion::for_item)
            .collect();

        tracing::debug!(
            tenant = %tenant_id,
            count = suggestions.len(),
            "Computed reorder suggestions"
        );
        Ok(suggestions)
    }
}

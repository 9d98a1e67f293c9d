//! Catalog writes: single-product CRUD and bulk inventory ingest.
//!
//! Both paths validate with the shared rules from `shopfront_core`, and both
//! go through [`MerchantLocks`] so that CRUD never interleaves with an ingest
//! of the same store.

mod locks;

pub use locks::MerchantLocks;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use shopfront_core::{
    FieldError, IngestMode, IngestReport, InventoryRow, InventorySnapshot, LowStockEntry,
    Product, ProductId, ProductInput, ProductPatch, RowErrors, StoreId, validate_rows,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::db::{CatalogRepository, RepositoryError};

/// Catalog operation errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid product: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    InvalidProduct(Vec<FieldError>),

    #[error("Validation failed: {0}")]
    ValidationFailed(RowErrors),

    #[error("An inventory ingest is in progress for store {0}")]
    IngestInProgress(StoreId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Ingest task failed: {0}")]
    Task(String),
}

/// Catalog service shared by the HTTP handlers and the CLI.
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepository>,
    locks: Arc<MerchantLocks>,
    low_stock_threshold: u32,
}

impl CatalogService {
    #[must_use]
    pub fn new(repo: Arc<dyn CatalogRepository>, low_stock_threshold: u32) -> Self {
        Self {
            repo,
            locks: Arc::new(MerchantLocks::new()),
            low_stock_threshold,
        }
    }

    /// The per-store locks guarding this catalog.
    #[must_use]
    pub fn locks(&self) -> &MerchantLocks {
        &self.locks
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the catalog cannot be read.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<Product>, CatalogError> {
        Ok(self.repo.list_products(store_id).await?)
    }

    /// Create one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidProduct` on bad fields,
    /// `CatalogError::IngestInProgress` while the store is being ingested.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &ProductInput,
    ) -> Result<Product, CatalogError> {
        let row = input.validate().map_err(CatalogError::InvalidProduct)?;
        let _guard = self.read_guard(store_id).await?;

        let product = self.repo.create_product(store_id, &row).await?;
        info!(product_id = %product.id, "Product created");
        self.note_low_stock(&product);
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidProduct` on bad fields,
    /// `CatalogError::IngestInProgress` while the store is being ingested, and
    /// `RepositoryError::NotFound` for a product of another store.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, CatalogError> {
        let patch = patch.validate().map_err(CatalogError::InvalidProduct)?;
        let _guard = self.read_guard(store_id).await?;

        let product = self.repo.update_product(store_id, product_id, &patch).await?;
        if patch.quantity.is_some() {
            self.note_low_stock(&product);
        }
        Ok(product)
    }

    /// Delete a product. Cart lines that reference it are left alone.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::IngestInProgress` while the store is being
    /// ingested and `RepositoryError::NotFound` for a product of another store.
    #[instrument(skip(self))]
    pub async fn delete(&self, store_id: StoreId, product_id: ProductId) -> Result<(), CatalogError> {
        let _guard = self.read_guard(store_id).await?;
        self.repo.delete_product(store_id, product_id).await?;
        info!("Product deleted");
        Ok(())
    }

    /// Validate every row, then apply the dataset atomically.
    ///
    /// Runs on its own task: once the rows are valid the ingest completes
    /// even if the caller goes away.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ValidationFailed` listing every bad row; in that
    /// case nothing was written.
    #[instrument(skip(self, source_name, rows), fields(rows = rows.len()))]
    pub async fn ingest(
        &self,
        store_id: StoreId,
        mode: IngestMode,
        source_name: String,
        rows: Vec<InventoryRow>,
    ) -> Result<IngestReport, CatalogError> {
        let rows = validate_rows(&rows).map_err(CatalogError::ValidationFailed)?;
        let service = self.clone();

        tokio::spawn(async move {
            let _guard = service.locks.write(store_id).await;
            let snapshot = InventorySnapshot {
                source_name,
                last_updated: Utc::now(),
            };
            let outcome = match mode {
                IngestMode::Replace => {
                    service
                        .repo
                        .replace_catalog(store_id, &rows, &snapshot)
                        .await?
                }
                IngestMode::Merge => service.repo.merge_catalog(store_id, &rows, &snapshot).await?,
            };

            let names: HashSet<&str> = rows.iter().map(|row| row.name.as_str()).collect();
            let low_stock: Vec<LowStockEntry> = outcome
                .products
                .iter()
                .filter(|p| names.contains(p.name.as_str()))
                .filter(|p| p.quantity <= service.low_stock_threshold)
                .map(|p| LowStockEntry {
                    product_id: p.id,
                    name: p.name.clone(),
                    quantity: p.quantity,
                })
                .collect();
            for entry in &low_stock {
                info!(
                    %store_id,
                    product_id = %entry.product_id,
                    name = %entry.name,
                    quantity = entry.quantity,
                    "Low stock after ingest"
                );
            }

            info!(
                %store_id,
                %mode,
                inserted = outcome.inserted,
                updated = outcome.updated,
                removed = outcome.removed,
                "Inventory ingested"
            );

            Ok::<_, CatalogError>(IngestReport {
                mode,
                inserted: outcome.inserted,
                updated: outcome.updated,
                removed: outcome.removed,
                low_stock,
                snapshot,
            })
        })
        .await
        .map_err(|e| CatalogError::Task(e.to_string()))?
    }

    /// The catalog as ingest rows, ready to be edited and merged back.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the catalog cannot be read.
    pub async fn export_rows(&self, store_id: StoreId) -> Result<Vec<InventoryRow>, CatalogError> {
        let products = self.repo.list_products(store_id).await?;
        Ok(products
            .into_iter()
            .map(|p| InventoryRow {
                name: p.name,
                unit_price: p.unit_price.amount(),
                description: p.description,
                quantity: i64::from(p.quantity),
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the snapshot cannot be read.
    pub async fn snapshot(
        &self,
        store_id: StoreId,
    ) -> Result<Option<InventorySnapshot>, CatalogError> {
        Ok(self.repo.latest_snapshot(store_id).await?)
    }

    async fn read_guard(
        &self,
        store_id: StoreId,
    ) -> Result<tokio::sync::OwnedRwLockReadGuard<()>, CatalogError> {
        self.locks
            .try_read(store_id)
            .await
            .ok_or(CatalogError::IngestInProgress(store_id))
    }

    fn note_low_stock(&self, product: &Product) {
        if product.quantity <= self.low_stock_threshold {
            info!(
                store_id = %product.store_id,
                product_id = %product.id,
                quantity = product.quantity,
                "Product at or below low-stock threshold"
            );
        }
    }
}

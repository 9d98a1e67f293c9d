//! Inventory ingest and export commands.
//!
//! # Usage
//!
//! ```bash
//! # Replace store 1's catalog with a rows file (destructive)
//! shopfront-cli ingest replace --store 1 --file april.json
//!
//! # Merge a recount by product name
//! shopfront-cli ingest merge --store 1 --file recount.json --source-name recount.xlsx
//!
//! # Print the catalog as rows, ready to edit and merge back
//! shopfront-cli export --store 1 > rows.json
//! ```
//!
//! A rows file is a JSON array of `{name, unit_price, description?, quantity}`.

use std::path::Path;
use std::sync::Arc;

use shopfront_core::{IngestMode, InventoryRow, StoreId};
use shopfront_server::catalog::CatalogService;
use shopfront_server::db::PgCatalogRepository;

use super::{CommandError, connect};

/// Threshold used for the low-stock part of the report.
const LOW_STOCK_THRESHOLD: u32 = 5;

/// Read a rows file.
///
/// # Errors
///
/// Returns `CommandError::Io` or `CommandError::Parse`.
pub async fn read_rows(path: &Path) -> Result<Vec<InventoryRow>, CommandError> {
    let display = path.display().to_string();
    let bytes = tokio::fs::read(path).await.map_err(|source| CommandError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| CommandError::Parse {
        path: display,
        source,
    })
}

/// The source name recorded when none is given: the file's name.
#[must_use]
pub fn default_source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Validate and apply a rows file through the catalog service.
///
/// # Errors
///
/// Returns `CommandError::Catalog` listing every bad row; nothing is written
/// in that case.
pub async fn ingest(
    mode: IngestMode,
    store_id: StoreId,
    file: &Path,
    source_name: Option<String>,
) -> Result<(), CommandError> {
    let rows = read_rows(file).await?;
    let source_name = source_name.unwrap_or_else(|| default_source_name(file));
    let pool = connect().await?;
    let catalog = CatalogService::new(Arc::new(PgCatalogRepository::new(pool)), LOW_STOCK_THRESHOLD);

    tracing::info!(%store_id, %mode, rows = rows.len(), "Ingesting inventory");
    let report = catalog.ingest(store_id, mode, source_name, rows).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Print a store's catalog as rows.
///
/// # Errors
///
/// Returns `CommandError` if the catalog cannot be read.
pub async fn export(store_id: StoreId) -> Result<(), CommandError> {
    let pool = connect().await?;
    let catalog = CatalogService::new(Arc::new(PgCatalogRepository::new(pool)), LOW_STOCK_THRESHOLD);
    let rows = catalog.export_rows(store_id).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(())
}

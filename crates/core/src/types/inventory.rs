//! Bulk inventory ingest types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// One spreadsheet-derived row, before validation.
///
/// Parsing the spreadsheet itself happens elsewhere; this is the shape the
/// parser hands over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub name: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
}

/// How an ingest applies its rows to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Remove every existing product, then insert every row. Destructive.
    Replace,
    /// Update products matched by exact name, insert the rest, delete nothing.
    Merge,
}

impl IngestMode {
    /// Whether this mode deletes products that are absent from the dataset.
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Replace)
    }
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Metadata about the most recent ingest of a store's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub source_name: String,
    pub last_updated: DateTime<Utc>,
}

/// A product at or below the low-stock threshold after an ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub mode: IngestMode,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub low_stock: Vec<LowStockEntry>,
    pub snapshot: InventorySnapshot,
}

//! Catalog products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ProductId, StoreId, UnitPrice};

/// A product in a merchant's catalog.
///
/// `quantity` is the authoritative stock count. Cart operations never change
/// it; only single-product CRUD and inventory ingest do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub unit_price: UnitPrice,
    pub description: Option<String>,
    pub quantity: u32,
    pub image_url: Option<Url>,
}

impl Product {
    /// Whether any units are in stock.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.quantity > 0
    }
}

/// Unvalidated input for creating a product.
///
/// Fields are deliberately loose (signed quantity, raw decimal) so that the
/// shared validator can report every problem at once instead of failing at
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub image_url: Option<Url>,
}

/// Partial update of a product; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub image_url: Option<Url>,
}

impl ProductPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.unit_price.is_none()
            && self.description.is_none()
            && self.quantity.is_none()
            && self.image_url.is_none()
    }
}

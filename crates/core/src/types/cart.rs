//! Shopping cart lines and the pure arithmetic applied to them.
//!
//! Both the device-local cart and the authoritative server cart use these
//! types, so a line means the same thing wherever it is stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{CartItemId, Product, ProductId, UnitPrice};

/// One product in a cart.
///
/// Name, price, image and stock are denormalized at write time so that the
/// cart can be displayed without fetching the catalog again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    /// Server-issued identity; only present on authoritative (remote) lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_item_id: Option<CartItemId>,
    pub quantity: u32,
    pub name: String,
    pub unit_price: UnitPrice,
    #[serde(default)]
    pub image_url: Option<Url>,
    pub stock_at_read: u32,
}

impl CartLine {
    /// Build a new line for `product`.
    #[must_use]
    pub fn for_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            cart_item_id: None,
            quantity,
            name: product.name.clone(),
            unit_price: product.unit_price,
            image_url: product.image_url.clone(),
            stock_at_read: product.quantity,
        }
    }

    /// Price of the whole line.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.unit_price.times(self.quantity)
    }

    fn refresh_from(&mut self, product: &Product) {
        self.name.clone_from(&product.name);
        self.unit_price = product.unit_price;
        self.image_url.clone_from(&product.image_url);
        self.stock_at_read = product.quantity;
    }
}

/// A quantity change for one line.
///
/// The remote cart protocol has a single mutation verb; `Set(0)` removes the
/// line and is never displayed as a zero-quantity line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWrite {
    /// Add to the existing quantity (or create the line).
    Add(u32),
    /// Replace the existing quantity (or create the line). Zero removes.
    Set(u32),
}

impl LineWrite {
    /// The quantity carried by the write.
    #[must_use]
    pub const fn quantity(self) -> u32 {
        match self {
            Self::Add(quantity) | Self::Set(quantity) => quantity,
        }
    }

    /// Quantity of the line after applying this write to `current`.
    #[must_use]
    pub const fn resulting_quantity(self, current: u32) -> u32 {
        match self {
            Self::Add(quantity) => current.saturating_add(quantity),
            Self::Set(quantity) => quantity,
        }
    }
}

/// Advisory notice that a line holds more units than were last known in stock.
///
/// Adding beyond visible stock is allowed; the order subsystem performs the
/// authoritative check at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWarning {
    pub product_id: ProductId,
    pub requested: u32,
    pub available: u32,
}

/// What a stock re-read did to a local line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Quantity lowered to the available stock.
    Clamped,
    /// The product exists but has no stock; the line is kept as-is.
    OutOfStock,
    /// The product is no longer in the catalog; the line is kept as-is.
    Unavailable,
}

/// A change (or flag) applied to a local line when stock was re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub kind: AdjustmentKind,
    pub previous_quantity: u32,
    pub quantity: u32,
    pub available: u32,
}

/// A cart for one (store, shopper) pair.
///
/// Lines are unique by product and kept in the order products were first
/// added; adding more of a product already in the cart keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from lines, summing any duplicate products into the first
    /// occurrence and dropping zero-quantity lines.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match cart.line_mut(line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the cart, returning its lines in display order.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// The line for `product_id`, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::total).sum()
    }

    /// Apply a write for `product`, refreshing the line's denormalized fields.
    ///
    /// Returns a warning when the resulting quantity exceeds the product's
    /// stock. The write is applied regardless.
    pub fn apply(&mut self, product: &Product, write: LineWrite) -> Option<StockWarning> {
        let current = self.line(product.id).map_or(0, |line| line.quantity);
        let quantity = write.resulting_quantity(current);

        if quantity == 0 {
            self.remove(product.id);
            return None;
        }

        match self.line_mut(product.id) {
            Some(line) => {
                line.quantity = quantity;
                line.refresh_from(product);
            }
            None => self.lines.push(CartLine::for_product(product, quantity)),
        }

        (quantity > product.quantity).then_some(StockWarning {
            product_id: product.id,
            requested: quantity,
            available: product.quantity,
        })
    }

    /// Set the quantity of an existing line without catalog data.
    ///
    /// Returns `None` if there is no line for `product_id`, otherwise an
    /// optional warning against the line's last known stock. A zero quantity
    /// is not accepted here; removal goes through [`Cart::remove`].
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Option<Option<StockWarning>> {
        debug_assert!(quantity > 0, "removal must go through Cart::remove");
        let line = self.line_mut(product_id)?;
        line.quantity = quantity;
        Some((quantity > line.stock_at_read).then_some(StockWarning {
            product_id,
            requested: quantity,
            available: line.stock_at_read,
        }))
    }

    /// Remove the line for `product_id`, returning it if it existed.
    pub fn remove(&mut self, product_id: ProductId) -> Option<CartLine> {
        let position = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id)?;
        Some(self.lines.remove(position))
    }

    /// Re-check every line against freshly read stock levels.
    ///
    /// `stock` returns the current quantity of a product, or `None` if the
    /// product no longer exists. Lines above a positive stock level are
    /// clamped to it; every change and every out-of-stock or vanished product
    /// is reported. Stock levels only ever lower quantities here.
    pub fn reconcile_stock(
        &mut self,
        stock: impl Fn(ProductId) -> Option<u32>,
    ) -> Vec<StockAdjustment> {
        let mut adjustments = Vec::new();
        for line in &mut self.lines {
            let previous_quantity = line.quantity;
            let kind = match stock(line.product_id) {
                None => {
                    line.stock_at_read = 0;
                    Some(AdjustmentKind::Unavailable)
                }
                Some(0) => {
                    line.stock_at_read = 0;
                    Some(AdjustmentKind::OutOfStock)
                }
                Some(available) => {
                    line.stock_at_read = available;
                    (line.quantity > available).then(|| {
                        line.quantity = available;
                        AdjustmentKind::Clamped
                    })
                }
            };
            if let Some(kind) = kind {
                adjustments.push(StockAdjustment {
                    product_id: line.product_id,
                    kind,
                    previous_quantity,
                    quantity: line.quantity,
                    available: line.stock_at_read,
                });
            }
        }
        adjustments
    }
}

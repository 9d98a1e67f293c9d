//! JSON request and error bodies shared by the backend and its clients.

use serde::{Deserialize, Serialize};

use super::{DeviceToken, InventoryRow, LineWrite, ProductId};

/// Whether a cart item write replaces or adds to the current quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Set,
    Add,
}

/// Body of `PUT /api/stores/{store_id}/cart/items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub mode: WriteMode,
}

impl CartItemRequest {
    /// Build the request for a line write.
    #[must_use]
    pub const fn new(product_id: ProductId, write: LineWrite) -> Self {
        let (mode, quantity) = match write {
            LineWrite::Add(quantity) => (WriteMode::Add, quantity),
            LineWrite::Set(quantity) => (WriteMode::Set, quantity),
        };
        Self {
            product_id,
            quantity,
            mode,
        }
    }

    /// The line write this request describes.
    #[must_use]
    pub const fn write(&self) -> LineWrite {
        match self.mode {
            WriteMode::Add => LineWrite::Add(self.quantity),
            WriteMode::Set => LineWrite::Set(self.quantity),
        }
    }
}

/// Body of `POST /api/merchant/inventory/{replace,merge}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub source_name: String,
    pub rows: Vec<InventoryRow>,
}

/// Body of `POST /api/device-tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTokenRequest {
    pub token: DeviceToken,
}

/// JSON error body returned by the backend for every non-2xx response.
///
/// `error` is a stable machine-readable code; the optional fields are filled
/// for `insufficient_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u32>,
}

impl ErrorBody {
    /// An error body with no stock details.
    #[must_use]
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_owned(),
            message: message.into(),
            product_id: None,
            requested: None,
            available: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_request_wire_format() {
        let request = CartItemRequest::new(ProductId::new(3), LineWrite::Add(2));
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"product_id": 3, "quantity": 2, "mode": "add"})
        );
    }

    #[test]
    fn test_mode_defaults_to_set() {
        let request: CartItemRequest =
            serde_json::from_str(r#"{"product_id": 3, "quantity": 0}"#).unwrap();
        assert_eq!(request.write(), LineWrite::Set(0));
    }
}

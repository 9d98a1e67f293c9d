//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Storefront (public and customer)
//! GET    /api/stores/{store_id}/products     - Catalog with current stock
//! GET    /api/stores/{store_id}/cart         - Customer cart
//! PUT    /api/stores/{store_id}/cart/items   - Set or add one line
//!
//! # Merchant
//! GET    /api/merchant/products              - List own catalog
//! POST   /api/merchant/products              - Create product
//! PUT    /api/merchant/products/{id}         - Patch product
//! DELETE /api/merchant/products/{id}         - Delete product
//! POST   /api/merchant/inventory/replace     - Replace whole catalog
//! POST   /api/merchant/inventory/merge       - Merge rows by name
//! GET    /api/merchant/inventory/snapshot    - Last ingest metadata
//! GET    /api/merchant/inventory/rows        - Export catalog as rows
//!
//! # Devices
//! POST   /api/device-tokens                  - Register a push token
//! ```

pub mod cart;
pub mod devices;
pub mod inventory;
pub mod products;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the storefront routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/{store_id}/products", get(products::store_products))
        .route("/{store_id}/cart", get(cart::show))
        .route("/{store_id}/cart/items", put(cart::write_item))
}

/// Create the merchant routes router.
pub fn merchant_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route("/inventory/replace", post(inventory::replace))
        .route("/inventory/merge", post(inventory::merge))
        .route("/inventory/snapshot", get(inventory::snapshot))
        .route("/inventory/rows", get(inventory::rows))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/stores", store_routes())
        .nest("/api/merchant", merchant_routes())
        .route("/api/device-tokens", post(devices::register))
}

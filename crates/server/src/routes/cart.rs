//! Authoritative cart route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use shopfront_core::{Cart, CartItemRequest, LineWrite, StoreId};
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::state::AppState;

#[instrument(skip_all, fields(%store_id, %customer_id))]
pub async fn show(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    RequireCustomer(customer_id): RequireCustomer,
) -> Result<Json<Cart>> {
    Ok(Json(state.carts().cart(customer_id, store_id).await?))
}

/// The single cart mutation: `set` replaces the line quantity (zero removes
/// the line), `add` adds to it. The resulting quantity is checked against
/// stock.
#[instrument(skip_all, fields(%store_id, %customer_id, product_id = %request.product_id))]
pub async fn write_item(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    RequireCustomer(customer_id): RequireCustomer,
    Json(request): Json<CartItemRequest>,
) -> Result<Json<Cart>> {
    let write = request.write();
    if write == LineWrite::Add(0) {
        return Err(AppError::InvalidQuantity(
            "add requires a positive quantity".to_string(),
        ));
    }

    let cart = state
        .carts()
        .write_item(customer_id, store_id, request.product_id, write)
        .await?;
    info!(?write, lines = cart.len(), "Cart line written");
    Ok(Json(cart))
}

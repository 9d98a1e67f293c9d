//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use shopfront_core::{Product, ProductId, ProductInput, ProductPatch, StoreId};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::state::AppState;

/// Public catalog of a store; shopper devices read stock from here.
#[instrument(skip(state))]
pub async fn store_products(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list(store_id).await?))
}

pub async fn list(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list(store_id).await?))
}

#[instrument(skip_all, fields(%store_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create(store_id, &input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip_all, fields(%store_id, %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().update(store_id, id, &patch).await?))
}

#[instrument(skip_all, fields(%store_id, %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireMerchant(store_id): RequireMerchant,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

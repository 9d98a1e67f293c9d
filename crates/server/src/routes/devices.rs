//! Push device token route handlers.

use axum::{Json, extract::State, http::StatusCode};
use shopfront_core::DeviceTokenRequest;
use tracing::info;

use crate::error::Result;
use crate::middleware::OptionalCustomer;
use crate::state::AppState;

/// Register a token. Repeats are accepted and answered with 200.
pub async fn register(
    State(state): State<AppState>,
    OptionalCustomer(customer_id): OptionalCustomer,
    Json(request): Json<DeviceTokenRequest>,
) -> Result<StatusCode> {
    let created = state
        .device_tokens()
        .register(&request.token, customer_id)
        .await?;
    info!(token = %request.token, ?customer_id, created, "Device token registered");

    Ok(if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

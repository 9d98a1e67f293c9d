//! Bearer-token authentication extractors.
//!
//! Tokens are opaque; each one maps to a merchant (one store) or a customer
//! through the [`SessionRepository`](crate::db::SessionRepository).

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use shopfront_core::{CustomerId, StoreId};

use crate::db::Principal;
use crate::error::AppError;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_string()))
}

async fn principal(parts: &Parts, state: &AppState) -> Result<Option<Principal>, AppError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };
    state
        .sessions()
        .principal(token)
        .await?
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("unknown bearer token".to_string()))
}

/// Extractor that requires a signed-in customer.
///
/// # Example
///
/// ```rust,ignore
/// async fn cart(RequireCustomer(customer_id): RequireCustomer) -> impl IntoResponse {
///     format!("cart of {customer_id}")
/// }
/// ```
pub struct RequireCustomer(pub CustomerId);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match principal(parts, state).await? {
            Some(Principal::Customer(customer_id)) => Ok(Self(customer_id)),
            Some(Principal::Merchant(_)) => Err(AppError::Unauthorized(
                "customer credentials required".to_string(),
            )),
            None => Err(AppError::Unauthorized("missing bearer token".to_string())),
        }
    }
}

/// Extractor that requires a merchant; yields the merchant's store.
pub struct RequireMerchant(pub StoreId);

impl FromRequestParts<AppState> for RequireMerchant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match principal(parts, state).await? {
            Some(Principal::Merchant(store_id)) => Ok(Self(store_id)),
            Some(Principal::Customer(_)) => Err(AppError::Unauthorized(
                "merchant credentials required".to_string(),
            )),
            None => Err(AppError::Unauthorized("missing bearer token".to_string())),
        }
    }
}

/// Extractor that optionally gets the signed-in customer.
///
/// A request without a token is anonymous; a token that is present but
/// unknown is still rejected.
pub struct OptionalCustomer(pub Option<CustomerId>);

impl FromRequestParts<AppState> for OptionalCustomer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(match principal(parts, state).await? {
            Some(Principal::Customer(customer_id)) => Some(customer_id),
            Some(Principal::Merchant(_)) | None => None,
        }))
    }
}

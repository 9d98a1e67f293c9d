//! Router harness for route tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use shopfront_core::{CustomerId, Product, ProductInput, StoreId};
use tower::ServiceExt;

use crate::db::{MemoryStore, Principal, SessionRepository};
use crate::state::AppState;

pub const MERCHANT_TOKEN: &str = "merchant-1";
pub const OTHER_MERCHANT_TOKEN: &str = "merchant-2";
pub const CUSTOMER_TOKEN: &str = "customer-7";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Store 1 and 2 merchants plus customer 7, over an empty catalog.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .create(MERCHANT_TOKEN, Principal::Merchant(StoreId::new(1)))
            .await
            .unwrap();
        store
            .create(OTHER_MERCHANT_TOKEN, Principal::Merchant(StoreId::new(2)))
            .await
            .unwrap();
        store
            .create(CUSTOMER_TOKEN, Principal::Customer(CustomerId::new(7)))
            .await
            .unwrap();

        let state = AppState::in_memory(store, 5);
        let router = crate::app(state.clone(), std::time::Duration::from_secs(5));
        Self { state, router }
    }

    /// Create a product in store 1.
    pub async fn seed_product(&self, name: &str, quantity: i64) -> Product {
        let input = ProductInput {
            name: name.to_string(),
            unit_price: Decimal::new(999, 2),
            description: None,
            quantity,
            image_url: None,
        };
        self.state
            .catalog()
            .create(StoreId::new(1), &input)
            .await
            .unwrap()
    }

    /// Send one request; an empty response body reads as `null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }
}

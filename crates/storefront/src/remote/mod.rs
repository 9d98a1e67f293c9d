//! Backend transport.
//!
//! The engine talks to the backend through three narrow traits so that the
//! cart, stock and token logic can be exercised without a network. The
//! production implementation is [`ApiClient`].

mod client;

pub use client::ApiClient;

use async_trait::async_trait;
use shopfront_core::{Cart, Credential, DeviceToken, LineWrite, Product, ProductId, StoreId};
use thiserror::Error;

/// Errors from a single backend call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent or the response could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// The backend failed (5xx).
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The backend refused the credential (401).
    #[error("unauthorized")]
    Unauthorized,

    /// The backend refused a cart write because stock is too low (409).
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Any other client error (4xx).
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A 2xx response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Authoritative cart operations for an authenticated shopper.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Read the shopper's cart for a store, with stock read at the same time.
    async fn fetch_cart(&self, credential: &Credential, store_id: StoreId)
    -> Result<Cart, RemoteError>;

    /// Upsert one line and return the resulting cart.
    async fn write_item(
        &self,
        credential: &Credential,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, RemoteError>;
}

/// Public catalog reads.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Every product of a store with its current stock.
    async fn store_products(&self, store_id: StoreId) -> Result<Vec<Product>, RemoteError>;
}

/// Push token registration.
#[async_trait]
pub trait DeviceTokenApi: Send + Sync {
    /// Register a device token, associating it with the shopper if a
    /// credential is given.
    async fn register_device(
        &self,
        credential: Option<&Credential>,
        token: &DeviceToken,
    ) -> Result<(), RemoteError>;
}

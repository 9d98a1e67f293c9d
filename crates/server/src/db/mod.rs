//! Persistence for the backend.
//!
//! # Tables
//!
//! - `products` - Per-store catalogs; `quantity` is the authoritative stock count
//! - `inventory_snapshots` - Source and time of each store's last ingest
//! - `cart_items` - Authoritative carts of signed-in customers
//! - `device_tokens` - Push tokens, optionally bound to a customer
//! - `api_sessions` - Bearer tokens for merchants and customers
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```
//!
//! Every repository is a trait so that handlers and the catalog service can
//! run against [`MemoryStore`] in tests and against `PostgreSQL` in
//! production.

mod carts;
mod catalog;
mod device_tokens;
mod memory;
mod sessions;

pub use carts::PgCartRepository;
pub use catalog::PgCatalogRepository;
pub use device_tokens::PgDeviceTokenRepository;
pub use memory::MemoryStore;
pub use sessions::PgSessionRepository;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use shopfront_core::{
    Cart, CustomerId, DeviceToken, InventorySnapshot, LineWrite, Product, ProductId, StoreId,
    ValidatedPatch, ValidatedRow,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database failed validation.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("Not found")]
    NotFound,

    /// Unique constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict`, keeping other errors as-is.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("{what} already exists"))
            }
            _ => Self::Database(err),
        }
    }
}

/// Failure of an authoritative cart write.
#[derive(Debug, Error)]
pub enum CartWriteError {
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Who a bearer token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Merchant(StoreId),
    Customer(CustomerId),
}

/// What an ingest did to a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// The store's catalog after the ingest.
    pub products: Vec<Product>,
}

/// Per-store product catalogs.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Every product of a store, by id.
    async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the store already has a product
    /// with this name.
    async fn create_product(
        &self,
        store_id: StoreId,
        row: &ValidatedRow,
    ) -> Result<Product, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in this store.
    async fn update_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        patch: &ValidatedPatch,
    ) -> Result<Product, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in this store.
    async fn delete_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError>;

    /// Delete the whole catalog and insert `rows`, atomically with the snapshot.
    async fn replace_catalog(
        &self,
        store_id: StoreId,
        rows: &[ValidatedRow],
        snapshot: &InventorySnapshot,
    ) -> Result<IngestOutcome, RepositoryError>;

    /// Update products matched by exact name and insert the rest, atomically
    /// with the snapshot. Nothing is deleted.
    async fn merge_catalog(
        &self,
        store_id: StoreId,
        rows: &[ValidatedRow],
        snapshot: &InventorySnapshot,
    ) -> Result<IngestOutcome, RepositoryError>;

    async fn latest_snapshot(
        &self,
        store_id: StoreId,
    ) -> Result<Option<InventorySnapshot>, RepositoryError>;
}

/// Authoritative carts of signed-in customers.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The customer's cart in a store, with current stock on every line.
    async fn cart(&self, customer_id: CustomerId, store_id: StoreId)
    -> Result<Cart, RepositoryError>;

    /// Apply one line write and return the resulting cart.
    ///
    /// `Set(0)` removes the line. Any other write checks the resulting
    /// quantity against the product's stock in the same transaction.
    async fn write_item(
        &self,
        customer_id: CustomerId,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, CartWriteError>;
}

/// Push tokens.
#[async_trait]
pub trait DeviceTokenRepository: Send + Sync {
    /// Upsert a token. Returns `true` if the token was not known before.
    ///
    /// A later anonymous registration never unbinds a customer.
    async fn register(
        &self,
        token: &DeviceToken,
        customer_id: Option<CustomerId>,
    ) -> Result<bool, RepositoryError>;
}

/// Bearer sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn principal(&self, token: &str) -> Result<Option<Principal>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token is already in use.
    async fn create(&self, token: &str, principal: Principal) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a stored quantity, rejecting negatives.
pub(crate) fn quantity_from_db(value: i32, what: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {what} quantity: {value}")))
}

/// Convert a quantity for storage.
pub(crate) fn quantity_to_db(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {value} exceeds storage range")))
}

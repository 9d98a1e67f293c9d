//! Read-side view of per-product stock.
//!
//! Stock counts are only ever read here. Readers tolerate staleness up to the
//! cache lifetime; the backend's cart writes and the order subsystem perform
//! the authoritative checks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use shopfront_core::{Product, ProductId, StoreId};
use tracing::debug;

use crate::error::EngineError;
use crate::remote::CatalogApi;

/// Stock levels of one store at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSnapshot {
    pub store_id: StoreId,
    pub read_at: DateTime<Utc>,
    levels: HashMap<ProductId, u32>,
}

impl StockSnapshot {
    /// Build a snapshot from catalog products.
    #[must_use]
    pub fn from_products(store_id: StoreId, products: &[Product]) -> Self {
        Self {
            store_id,
            read_at: Utc::now(),
            levels: products
                .iter()
                .map(|product| (product.id, product.quantity))
                .collect(),
        }
    }

    /// Current stock of a product, or `None` if it is not in the catalog.
    #[must_use]
    pub fn quantity(&self, product_id: ProductId) -> Option<u32> {
        self.levels.get(&product_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Source of stock snapshots.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// A snapshot no older than the ledger's cache lifetime.
    async fn snapshot(&self, store_id: StoreId) -> Result<Arc<StockSnapshot>, EngineError>;

    /// Drop any cached snapshot so the next read goes to the backend.
    async fn invalidate(&self, store_id: StoreId);
}

/// Ledger backed by the public catalog endpoint with a TTL cache.
#[derive(Clone)]
pub struct CatalogStockLedger {
    api: Arc<dyn CatalogApi>,
    cache: Cache<StoreId, Arc<StockSnapshot>>,
}

impl CatalogStockLedger {
    #[must_use]
    pub fn new(api: Arc<dyn CatalogApi>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(64).time_to_live(ttl).build();
        Self { api, cache }
    }
}

#[async_trait]
impl StockLedger for CatalogStockLedger {
    async fn snapshot(&self, store_id: StoreId) -> Result<Arc<StockSnapshot>, EngineError> {
        if let Some(cached) = self.cache.get(&store_id).await {
            debug!(%store_id, "Stock snapshot cache hit");
            return Ok(cached);
        }

        let products = self.api.store_products(store_id).await?;
        let snapshot = Arc::new(StockSnapshot::from_products(store_id, &products));
        debug!(%store_id, products = snapshot.len(), "Stock snapshot refreshed");
        self.cache.insert(store_id, Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }

    async fn invalidate(&self, store_id: StoreId) {
        self.cache.invalidate(&store_id).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, product};

    #[tokio::test]
    async fn test_snapshot_is_cached_until_invalidated() {
        let backend = Arc::new(FakeBackend::new());
        backend.put_product(product(1, 1, 5));
        let ledger = CatalogStockLedger::new(backend.clone(), Duration::from_secs(60));
        let store = StoreId::new(1);

        let first = ledger.snapshot(store).await.unwrap();
        assert_eq!(first.quantity(ProductId::new(1)), Some(5));

        backend.set_stock(ProductId::new(1), 2);
        let cached = ledger.snapshot(store).await.unwrap();
        assert_eq!(cached.quantity(ProductId::new(1)), Some(5));
        assert_eq!(backend.catalog_reads(), 1);

        ledger.invalidate(store).await;
        let fresh = ledger.snapshot(store).await.unwrap();
        assert_eq!(fresh.quantity(ProductId::new(1)), Some(2));
        assert_eq!(fresh.quantity(ProductId::new(9)), None);
    }
}

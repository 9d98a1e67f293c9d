//! Per-store ingest locks.

use std::collections::HashMap;
use std::sync::Arc;

use shopfront_core::StoreId;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// One reader/writer lock per store.
///
/// Ingests take the write side and queue behind each other. Single-product
/// CRUD only ever tries the read side, so it is turned away instead of
/// waiting while an ingest runs.
#[derive(Debug, Default)]
pub struct MerchantLocks {
    stores: Mutex<HashMap<StoreId, Arc<RwLock<()>>>>,
}

impl MerchantLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, store_id: StoreId) -> Arc<RwLock<()>> {
        self.stores
            .lock()
            .await
            .entry(store_id)
            .or_default()
            .clone()
    }

    /// Wait for exclusive access to a store's catalog.
    pub async fn write(&self, store_id: StoreId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(store_id).await.write_owned().await
    }

    /// Shared access, or `None` while an ingest holds the store.
    pub async fn try_read(&self, store_id: StoreId) -> Option<OwnedRwLockReadGuard<()>> {
        self.lock_for(store_id).await.try_read_owned().ok()
    }
}

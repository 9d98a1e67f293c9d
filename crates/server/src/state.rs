//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::CatalogService;
use crate::config::ServerConfig;
use crate::db::{
    CartRepository, DeviceTokenRepository, MemoryStore, PgCartRepository, PgCatalogRepository,
    PgDeviceTokenRepository, PgSessionRepository, SessionRepository,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`; repositories are trait objects
/// so that tests can run the same router over [`MemoryStore`].
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    catalog: CatalogService,
    carts: Arc<dyn CartRepository>,
    device_tokens: Arc<dyn DeviceTokenRepository>,
    sessions: Arc<dyn SessionRepository>,
    pool: Option<PgPool>,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(config: &ServerConfig, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                catalog: CatalogService::new(
                    Arc::new(PgCatalogRepository::new(pool.clone())),
                    config.low_stock_threshold,
                ),
                carts: Arc::new(PgCartRepository::new(pool.clone())),
                device_tokens: Arc::new(PgDeviceTokenRepository::new(pool.clone())),
                sessions: Arc::new(PgSessionRepository::new(pool.clone())),
                pool: Some(pool),
            }),
        }
    }

    /// State over one shared [`MemoryStore`].
    #[must_use]
    pub fn in_memory(store: Arc<MemoryStore>, low_stock_threshold: u32) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                catalog: CatalogService::new(store.clone(), low_stock_threshold),
                carts: store.clone(),
                device_tokens: store.clone(),
                sessions: store,
                pool: None,
            }),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn carts(&self) -> &dyn CartRepository {
        self.inner.carts.as_ref()
    }

    #[must_use]
    pub fn device_tokens(&self) -> &dyn DeviceTokenRepository {
        self.inner.device_tokens.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionRepository {
        self.inner.sessions.as_ref()
    }

    /// The database pool, when backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}

//! Wiring for an embedding application.

use std::sync::Arc;

use shopfront_core::StoreId;
use tokio::task::JoinHandle;

use crate::auth::{AuthChannel, Shopper};
use crate::cart::{CartReconciler, LocalCartStore};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::kv::{FileKeyValueStore, KeyValueStore};
use crate::ledger::{CatalogStockLedger, StockLedger};
use crate::notifications::NotificationTokenManager;
use crate::remote::ApiClient;
use crate::session::SessionDriver;

/// Every engine component, built from one configuration.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    api: ApiClient,
    auth: AuthChannel,
    ledger: Arc<CatalogStockLedger>,
    reconciler: CartReconciler,
    tokens: NotificationTokenManager,
}

impl Engine {
    /// Build an engine that keeps device state in `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let kv = Arc::new(FileKeyValueStore::new(config.data_dir.clone()));
        Self::with_store(config, kv)
    }

    /// Build an engine over a caller-supplied key-value store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_store(
        config: EngineConfig,
        kv: Arc<dyn KeyValueStore>,
    ) -> Result<Self, EngineError> {
        let api = ApiClient::new(&config)?;
        let shared_api = Arc::new(api.clone());

        let ledger = Arc::new(CatalogStockLedger::new(
            shared_api.clone(),
            config.stock_cache_ttl,
        ));
        let reconciler = CartReconciler::new(
            Arc::new(LocalCartStore::new(Arc::clone(&kv))),
            shared_api.clone(),
            ledger.clone(),
            config.retry_delay,
        );
        let tokens = NotificationTokenManager::new(kv, shared_api, config.token_retry_delay);

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                api,
                auth: AuthChannel::new(),
                ledger,
                reconciler,
                tokens,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthChannel {
        &self.inner.auth
    }

    #[must_use]
    pub fn ledger(&self) -> &dyn StockLedger {
        self.inner.ledger.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &CartReconciler {
        &self.inner.reconciler
    }

    #[must_use]
    pub fn tokens(&self) -> &NotificationTokenManager {
        &self.inner.tokens
    }

    /// The shopper as currently known to the auth channel.
    #[must_use]
    pub fn shopper(&self) -> Shopper {
        self.inner.auth.current()
    }

    /// Start reacting to sign-ins for the store the shopper is browsing.
    #[must_use]
    pub fn start_session(&self, store_id: StoreId) -> JoinHandle<()> {
        SessionDriver::new(
            self.inner.reconciler.clone(),
            self.inner.tokens.clone(),
            store_id,
        )
        .spawn(self.inner.auth.subscribe())
    }
}

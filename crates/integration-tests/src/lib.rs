//! Integration tests for Shopfront.
//!
//! Each test spawns the backend router on an ephemeral port over an
//! in-memory store and points a real storefront [`Engine`] at it, so the
//! HTTP client, wire format and server handlers are exercised together.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! No database is needed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use shopfront_core::{
    Credential, CustomerId, IngestRequest, InventoryRow, Product, StoreId,
};
use shopfront_server::AppState;
use shopfront_server::db::{MemoryStore, Principal, SessionRepository};
use shopfront_storefront::remote::CatalogApi;
use shopfront_storefront::{Engine, EngineConfig};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Store owned by [`MERCHANT_TOKEN`].
pub const STORE: StoreId = StoreId::new(1);
/// Customer behind [`CUSTOMER_TOKEN`].
pub const CUSTOMER: CustomerId = CustomerId::new(7);

pub const MERCHANT_TOKEN: &str = "merchant-1";
pub const CUSTOMER_TOKEN: &str = "customer-7";

/// Low-stock threshold the backend runs with.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// A running backend plus everything needed to drive it.
pub struct TestContext {
    pub client: Client,
    pub base_url: Url,
    pub store: Arc<MemoryStore>,
    data_dir: TempDir,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a backend on `127.0.0.1` with one merchant and one customer.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .create(MERCHANT_TOKEN, Principal::Merchant(STORE))
            .await
            .expect("Failed to seed merchant session");
        store
            .create(CUSTOMER_TOKEN, Principal::Customer(CUSTOMER))
            .await
            .expect("Failed to seed customer session");

        let state = AppState::in_memory(store.clone(), LOW_STOCK_THRESHOLD);
        let app = shopfront_server::app(state, Duration::from_secs(5));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("Listener has no address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            client: Client::new(),
            base_url: Url::parse(&format!("http://{addr}/")).expect("Invalid test URL"),
            store,
            data_dir: TempDir::new().expect("Failed to create data dir"),
            server,
        }
    }

    /// Engine configuration with short retry delays.
    ///
    /// Engines built from the same context share the device data directory,
    /// like two launches of the same app.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.base_url.clone(), self.data_dir.path());
        config.retry_delay = Duration::from_millis(10);
        config.token_retry_delay = Duration::from_millis(10);
        config
    }

    /// A storefront engine persisting to this context's data directory.
    #[must_use]
    pub fn engine(&self) -> Engine {
        Engine::new(self.engine_config()).expect("Failed to build engine")
    }

    /// The customer's credential.
    #[must_use]
    pub fn customer(&self) -> Credential {
        Credential::new(CUSTOMER_TOKEN).expect("Empty credential")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("Invalid path")
    }

    /// Ingest `rows` as the merchant and return the response.
    pub async fn ingest(&self, mode: &str, rows: Vec<InventoryRow>) -> (StatusCode, Value) {
        let request = IngestRequest {
            source_name: format!("{mode}.xlsx"),
            rows,
        };
        let response = self
            .client
            .post(self.url(&format!("api/merchant/inventory/{mode}")))
            .bearer_auth(MERCHANT_TOKEN)
            .json(&request)
            .send()
            .await
            .expect("Ingest request failed");
        read(response).await
    }

    /// Replace the catalog with `(name, quantity)` pairs and return the
    /// products as the storefront sees them, in the same order.
    pub async fn stock(&self, products: &[(&str, i64)]) -> Vec<Product> {
        let rows = products
            .iter()
            .map(|(name, quantity)| row(name, *quantity))
            .collect();
        let (status, body) = self.ingest("replace", rows).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let catalog = self
            .engine()
            .api()
            .store_products(STORE)
            .await
            .expect("Failed to read catalog");
        products
            .iter()
            .map(|(name, _)| {
                catalog
                    .iter()
                    .find(|p| p.name == *name)
                    .cloned()
                    .expect("Ingested product missing from catalog")
            })
            .collect()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// An ingest row priced at 9.99.
#[must_use]
pub fn row(name: &str, quantity: i64) -> InventoryRow {
    InventoryRow {
        name: name.to_string(),
        unit_price: Decimal::new(999, 2),
        description: None,
        quantity,
    }
}

/// Status and JSON body; an empty body reads as `Null`.
pub async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.bytes().await.expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, body)
}

//! Where a cart lives: on the device or on the backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopfront_core::{Cart, CartLine, Credential, LineWrite, Product, ProductId, StoreId};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::EngineError;
use crate::kv::{self, KeyValueStore};
use crate::remote::CartApi;

/// Storage capability shared by the local and remote carts.
///
/// Quantities passed here are already validated; a `Set(0)` write removes the
/// line.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load(&self, store_id: StoreId) -> Result<Cart, EngineError>;

    /// Add to or replace a line with catalog data from `product`.
    async fn apply(
        &self,
        store_id: StoreId,
        product: &Product,
        write: LineWrite,
    ) -> Result<Cart, EngineError>;

    /// Change the quantity of an existing line identified only by product.
    ///
    /// Fails with `NotFound` if the cart holds no such line; zero removes it.
    async fn set_quantity(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, EngineError>;

    /// Remove a line. Removing an absent line succeeds.
    async fn remove(&self, store_id: StoreId, product_id: ProductId) -> Result<Cart, EngineError>;

    async fn clear(&self, store_id: StoreId) -> Result<Cart, EngineError>;
}

// =============================================================================
// LocalCartStore
// =============================================================================

const CART_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCart {
    version: u32,
    lines: Vec<CartLine>,
}

/// Anonymous carts, one key per store on the device.
///
/// Read-modify-write cycles are serialized so that two operations issued
/// back to back never lose an update.
pub struct LocalCartStore {
    kv: Arc<dyn KeyValueStore>,
    gate: Mutex<()>,
}

impl LocalCartStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            gate: Mutex::new(()),
        }
    }

    async fn read(&self, store_id: StoreId) -> Result<Cart, EngineError> {
        let persisted: Option<PersistedCart> =
            kv::read_json(self.kv.as_ref(), &kv::cart_key(store_id)).await?;
        Ok(persisted.map_or_else(Cart::new, |persisted| Cart::from_lines(persisted.lines)))
    }

    async fn persist(&self, store_id: StoreId, cart: &Cart) -> Result<(), EngineError> {
        let key = kv::cart_key(store_id);
        if cart.is_empty() {
            return self.kv.delete(&key).await;
        }
        let persisted = PersistedCart {
            version: CART_FORMAT_VERSION,
            lines: cart.lines().to_vec(),
        };
        kv::write_json(self.kv.as_ref(), &key, &persisted).await
    }

    /// Run `f` against the stored cart and persist the result.
    async fn modify<T: Send>(
        &self,
        store_id: StoreId,
        f: impl FnOnce(&mut Cart) -> Result<T, EngineError> + Send,
    ) -> Result<(Cart, T), EngineError> {
        let _guard = self.gate.lock().await;
        let mut cart = self.read(store_id).await?;
        let output = f(&mut cart)?;
        self.persist(store_id, &cart).await?;
        Ok((cart, output))
    }

    /// Replace the stored cart after a stock re-read lowered quantities.
    pub(crate) async fn replace_lines(
        &self,
        store_id: StoreId,
        updated: &Cart,
    ) -> Result<Cart, EngineError> {
        let (cart, ()) = self
            .modify(store_id, |cart| {
                for line in updated.lines() {
                    if let Some(current) = cart.line(line.product_id)
                        && current.quantity > line.quantity
                    {
                        cart.set_quantity(line.product_id, line.quantity);
                    }
                }
                Ok(())
            })
            .await?;
        Ok(cart)
    }

    /// Subtract `quantity` from a line after it was merged remotely, dropping
    /// the line once nothing is left.
    pub(crate) async fn take(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, EngineError> {
        let (cart, ()) = self
            .modify(store_id, |cart| {
                let remaining = cart
                    .line(product_id)
                    .map_or(0, |line| line.quantity.saturating_sub(quantity));
                if remaining == 0 {
                    cart.remove(product_id);
                } else {
                    cart.set_quantity(product_id, remaining);
                }
                Ok(())
            })
            .await?;
        Ok(cart)
    }
}

#[async_trait]
impl CartStore for LocalCartStore {
    async fn load(&self, store_id: StoreId) -> Result<Cart, EngineError> {
        let _guard = self.gate.lock().await;
        self.read(store_id).await
    }

    async fn apply(
        &self,
        store_id: StoreId,
        product: &Product,
        write: LineWrite,
    ) -> Result<Cart, EngineError> {
        let (cart, _warning) = self
            .modify(store_id, |cart| Ok(cart.apply(product, write)))
            .await?;
        Ok(cart)
    }

    async fn set_quantity(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, EngineError> {
        let (cart, ()) = self
            .modify(store_id, |cart| {
                if quantity == 0 {
                    cart.remove(product_id);
                    return Ok(());
                }
                cart.set_quantity(product_id, quantity)
                    .map(|_warning| ())
                    .ok_or(EngineError::NotFound {
                        store_id,
                        product_id,
                    })
            })
            .await?;
        Ok(cart)
    }

    async fn remove(&self, store_id: StoreId, product_id: ProductId) -> Result<Cart, EngineError> {
        let (cart, removed) = self
            .modify(store_id, |cart| Ok(cart.remove(product_id)))
            .await?;
        if removed.is_none() {
            debug!(%store_id, %product_id, "Removed absent local cart line");
        }
        Ok(cart)
    }

    async fn clear(&self, store_id: StoreId) -> Result<Cart, EngineError> {
        let _guard = self.gate.lock().await;
        self.kv.delete(&kv::cart_key(store_id)).await?;
        Ok(Cart::new())
    }
}

// =============================================================================
// RemoteCartStore
// =============================================================================

/// The authenticated shopper's cart on the backend.
pub struct RemoteCartStore {
    api: Arc<dyn CartApi>,
    credential: Credential,
}

impl RemoteCartStore {
    #[must_use]
    pub fn new(api: Arc<dyn CartApi>, credential: Credential) -> Self {
        Self { api, credential }
    }

    async fn write(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, EngineError> {
        Ok(self
            .api
            .write_item(&self.credential, store_id, product_id, write)
            .await?)
    }
}

#[async_trait]
impl CartStore for RemoteCartStore {
    async fn load(&self, store_id: StoreId) -> Result<Cart, EngineError> {
        Ok(self.api.fetch_cart(&self.credential, store_id).await?)
    }

    async fn apply(
        &self,
        store_id: StoreId,
        product: &Product,
        write: LineWrite,
    ) -> Result<Cart, EngineError> {
        self.write(store_id, product.id, write).await
    }

    /// The backend upserts on `set`, so the line is checked first.
    async fn set_quantity(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, EngineError> {
        if quantity > 0 && self.load(store_id).await?.line(product_id).is_none() {
            return Err(EngineError::NotFound {
                store_id,
                product_id,
            });
        }
        self.write(store_id, product_id, LineWrite::Set(quantity))
            .await
    }

    async fn remove(&self, store_id: StoreId, product_id: ProductId) -> Result<Cart, EngineError> {
        self.write(store_id, product_id, LineWrite::Set(0)).await
    }

    /// The backend has a single mutation verb, so clearing writes `Set(0)`
    /// for every line.
    async fn clear(&self, store_id: StoreId) -> Result<Cart, EngineError> {
        let mut cart = self.load(store_id).await?;
        let product_ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
        for product_id in product_ids {
            cart = self.write(store_id, product_id, LineWrite::Set(0)).await?;
        }
        Ok(cart)
    }
}

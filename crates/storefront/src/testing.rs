//! In-memory backend used by unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shopfront_core::{
    Cart, CartItemId, CartLine, Credential, DeviceToken, LineWrite, Product, ProductId, StoreId,
    UnitPrice,
};

use crate::remote::{CartApi, CatalogApi, DeviceTokenApi, RemoteError};

/// A failure the fake backend can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Timeout,
    Unavailable,
    Unauthorized,
    BadRequest,
}

impl Failure {
    fn into_error(self) -> RemoteError {
        match self {
            Self::Timeout => RemoteError::Timeout,
            Self::Unavailable => RemoteError::Server {
                status: 503,
                message: "unavailable".to_string(),
            },
            Self::Unauthorized => RemoteError::Unauthorized,
            Self::BadRequest => RemoteError::Rejected {
                status: 400,
                message: "bad request".to_string(),
            },
        }
    }
}

/// A fault injected into the next cart write only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteFault {
    /// Fail before anything is applied.
    Reject(Failure),
    /// Apply the write, then time out as if the response was lost.
    LoseResponse,
}

pub fn product(id: i32, store: i32, quantity: u32) -> Product {
    Product {
        id: ProductId::new(id),
        store_id: StoreId::new(store),
        name: format!("Product {id}"),
        unit_price: UnitPrice::new(Decimal::new(1000, 2)).unwrap(),
        description: None,
        quantity,
        image_url: None,
    }
}

pub fn credential(token: &str) -> Credential {
    Credential::new(token).unwrap()
}

/// Mimics the backend's cart, catalog and device token endpoints.
#[derive(Default)]
pub struct FakeBackend {
    products: Mutex<HashMap<ProductId, Product>>,
    carts: Mutex<HashMap<(String, StoreId), Vec<CartLine>>>,
    queued_failures: Mutex<VecDeque<Failure>>,
    queued_write_faults: Mutex<VecDeque<WriteFault>>,
    failing_products: Mutex<HashMap<ProductId, Failure>>,
    registered: Mutex<Vec<(Option<String>, DeviceToken)>>,
    catalog_reads: AtomicUsize,
    cart_writes: AtomicUsize,
    next_item_id: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_product(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id, product);
    }

    pub fn set_stock(&self, product_id: ProductId, quantity: u32) {
        if let Some(product) = self.products.lock().unwrap().get_mut(&product_id) {
            product.quantity = quantity;
        }
    }

    pub fn remove_product(&self, product_id: ProductId) {
        self.products.lock().unwrap().remove(&product_id);
    }

    /// Fail the next call (of any kind) with `failure`.
    pub fn fail_next(&self, failure: Failure) {
        self.queued_failures.lock().unwrap().push_back(failure);
    }

    /// Fail the next cart write with `failure`; reads are unaffected.
    pub fn fail_next_write(&self, failure: Failure) {
        self.queued_write_faults
            .lock()
            .unwrap()
            .push_back(WriteFault::Reject(failure));
    }

    /// Apply the next cart write but answer it with a timeout.
    pub fn lose_next_write_response(&self) {
        self.queued_write_faults
            .lock()
            .unwrap()
            .push_back(WriteFault::LoseResponse);
    }

    /// Fail every cart write for `product_id` with `failure`.
    pub fn fail_product(&self, product_id: ProductId, failure: Failure) {
        self.failing_products
            .lock()
            .unwrap()
            .insert(product_id, failure);
    }

    pub fn heal_product(&self, product_id: ProductId) {
        self.failing_products.lock().unwrap().remove(&product_id);
    }

    pub fn seed_cart(&self, token: &str, store_id: StoreId, product_id: ProductId, quantity: u32) {
        let product = self.products.lock().unwrap()[&product_id].clone();
        let line = self.line_for(&product, quantity);
        self.carts
            .lock()
            .unwrap()
            .entry((token.to_string(), store_id))
            .or_default()
            .push(line);
    }

    pub fn cart(&self, token: &str, store_id: StoreId) -> Cart {
        Cart::from_lines(
            self.carts
                .lock()
                .unwrap()
                .get(&(token.to_string(), store_id))
                .cloned()
                .unwrap_or_default(),
        )
    }

    pub fn registrations(&self) -> Vec<(Option<String>, DeviceToken)> {
        self.registered.lock().unwrap().clone()
    }

    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    pub fn cart_writes(&self) -> usize {
        self.cart_writes.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), RemoteError> {
        match self.queued_failures.lock().unwrap().pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn line_for(&self, product: &Product, quantity: u32) -> CartLine {
        let id = self.next_item_id.fetch_add(1, Ordering::SeqCst) + 1;
        CartLine {
            cart_item_id: Some(CartItemId::new(i32::try_from(id).unwrap())),
            ..CartLine::for_product(product, quantity)
        }
    }
}

#[async_trait]
impl CartApi for FakeBackend {
    async fn fetch_cart(
        &self,
        credential: &Credential,
        store_id: StoreId,
    ) -> Result<Cart, RemoteError> {
        self.take_failure()?;
        Ok(self.cart(credential.expose(), store_id))
    }

    async fn write_item(
        &self,
        credential: &Credential,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, RemoteError> {
        self.cart_writes.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let fault = self.queued_write_faults.lock().unwrap().pop_front();
        if let Some(WriteFault::Reject(failure)) = fault {
            return Err(failure.into_error());
        }
        if let Some(failure) = self.failing_products.lock().unwrap().get(&product_id) {
            return Err(failure.into_error());
        }

        let product = self
            .products
            .lock()
            .unwrap()
            .get(&product_id)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                message: format!("Product {product_id} not found"),
            })?;

        let key = (credential.expose().to_string(), store_id);
        {
            let mut carts = self.carts.lock().unwrap();
            let lines = carts.entry(key).or_default();
            let current = lines
                .iter()
                .find(|line| line.product_id == product_id)
                .map_or(0, |line| line.quantity);
            let quantity = write.resulting_quantity(current);

            if quantity > product.quantity {
                return Err(RemoteError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: product.quantity,
                });
            }

            if quantity == 0 {
                lines.retain(|line| line.product_id != product_id);
            } else if let Some(line) = lines.iter_mut().find(|line| line.product_id == product_id)
            {
                line.quantity = quantity;
                line.stock_at_read = product.quantity;
            } else {
                let line = self.line_for(&product, quantity);
                lines.push(line);
            }
        }

        if fault == Some(WriteFault::LoseResponse) {
            return Err(RemoteError::Timeout);
        }
        Ok(self.cart(credential.expose(), store_id))
    }
}

#[async_trait]
impl CatalogApi for FakeBackend {
    async fn store_products(&self, store_id: StoreId) -> Result<Vec<Product>, RemoteError> {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|product| product.store_id == store_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeviceTokenApi for FakeBackend {
    async fn register_device(
        &self,
        credential: Option<&Credential>,
        token: &DeviceToken,
    ) -> Result<(), RemoteError> {
        self.take_failure()?;
        self.registered.lock().unwrap().push((
            credential.map(|credential| credential.expose().to_string()),
            token.clone(),
        ));
        Ok(())
    }
}

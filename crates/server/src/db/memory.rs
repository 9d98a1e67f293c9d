//! In-memory implementation of every repository.
//!
//! Used by the route tests and the end-to-end tests. One lock guards all
//! data, so each trait method is atomic just as a transaction would be.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use shopfront_core::{
    Cart, CartItemId, CartLine, CustomerId, DeviceToken, InventorySnapshot, LineWrite, Product,
    ProductId, StoreId, ValidatedPatch, ValidatedRow,
};
use tokio::sync::RwLock;

use super::{
    CartRepository, CartWriteError, CatalogRepository, DeviceTokenRepository, IngestOutcome,
    Principal, RepositoryError, SessionRepository,
};

#[derive(Debug, Default)]
struct Data {
    next_product_id: i32,
    next_cart_item_id: i32,
    products: BTreeMap<ProductId, Product>,
    snapshots: HashMap<StoreId, InventorySnapshot>,
    carts: HashMap<(CustomerId, StoreId), Vec<CartLine>>,
    device_tokens: HashMap<String, Option<CustomerId>>,
    sessions: HashMap<String, Principal>,
}

impl Data {
    fn store_products(&self, store_id: StoreId) -> Vec<Product> {
        self.products
            .values()
            .filter(|p| p.store_id == store_id)
            .cloned()
            .collect()
    }

    fn name_taken(&self, store_id: StoreId, name: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.store_id == store_id && p.name == name && Some(p.id) != except)
    }

    fn insert(&mut self, store_id: StoreId, row: &ValidatedRow) -> Result<Product, RepositoryError> {
        if self.name_taken(store_id, &row.name, None) {
            return Err(RepositoryError::Conflict(format!(
                "product named {:?} already exists",
                row.name
            )));
        }
        self.next_product_id += 1;
        let product = Product {
            id: ProductId::new(self.next_product_id),
            store_id,
            name: row.name.clone(),
            unit_price: row.unit_price,
            description: row.description.clone(),
            quantity: row.quantity,
            image_url: row.image_url.clone(),
        };
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    fn cart(&self, customer_id: CustomerId, store_id: StoreId) -> Cart {
        let lines = self
            .carts
            .get(&(customer_id, store_id))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut line| {
                line.stock_at_read = self
                    .products
                    .get(&line.product_id)
                    .filter(|p| p.store_id == store_id)
                    .map_or(0, |p| p.quantity);
                line
            });
        Cart::from_lines(lines)
    }
}

/// Every repository over process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Data>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.data.read().await.store_products(store_id))
    }

    async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .data
            .read()
            .await
            .products
            .get(&product_id)
            .filter(|p| p.store_id == store_id)
            .cloned())
    }

    async fn create_product(
        &self,
        store_id: StoreId,
        row: &ValidatedRow,
    ) -> Result<Product, RepositoryError> {
        self.data.write().await.insert(store_id, row)
    }

    async fn update_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        patch: &ValidatedPatch,
    ) -> Result<Product, RepositoryError> {
        let mut data = self.data.write().await;
        if let Some(name) = &patch.name
            && data.name_taken(store_id, name, Some(product_id))
        {
            return Err(RepositoryError::Conflict(format!(
                "product named {name:?} already exists"
            )));
        }

        let product = data
            .products
            .get_mut(&product_id)
            .filter(|p| p.store_id == store_id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(name) = &patch.name {
            product.name.clone_from(name);
        }
        if let Some(unit_price) = patch.unit_price {
            product.unit_price = unit_price;
        }
        if let Some(description) = &patch.description {
            product.description = Some(description.clone());
        }
        if let Some(quantity) = patch.quantity {
            product.quantity = quantity;
        }
        if let Some(image_url) = &patch.image_url {
            product.image_url = Some(image_url.clone());
        }
        Ok(product.clone())
    }

    async fn delete_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        match data.products.get(&product_id) {
            Some(p) if p.store_id == store_id => {
                data.products.remove(&product_id);
                Ok(())
            }
            _ => Err(RepositoryError::NotFound),
        }
    }

    async fn replace_catalog(
        &self,
        store_id: StoreId,
        rows: &[ValidatedRow],
        snapshot: &InventorySnapshot,
    ) -> Result<IngestOutcome, RepositoryError> {
        let mut data = self.data.write().await;
        let before = data.products.len();
        data.products.retain(|_, p| p.store_id != store_id);
        let removed = before - data.products.len();

        for row in rows {
            data.insert(store_id, row)?;
        }
        data.snapshots.insert(store_id, snapshot.clone());

        Ok(IngestOutcome {
            inserted: rows.len(),
            updated: 0,
            removed,
            products: data.store_products(store_id),
        })
    }

    async fn merge_catalog(
        &self,
        store_id: StoreId,
        rows: &[ValidatedRow],
        snapshot: &InventorySnapshot,
    ) -> Result<IngestOutcome, RepositoryError> {
        let mut data = self.data.write().await;
        let mut inserted = 0;
        let mut updated = 0;

        for row in rows {
            let existing = data
                .products
                .values_mut()
                .find(|p| p.store_id == store_id && p.name == row.name);
            if let Some(product) = existing {
                product.unit_price = row.unit_price;
                product.description.clone_from(&row.description);
                product.quantity = row.quantity;
                updated += 1;
            } else {
                data.insert(store_id, row)?;
                inserted += 1;
            }
        }
        data.snapshots.insert(store_id, snapshot.clone());

        Ok(IngestOutcome {
            inserted,
            updated,
            removed: 0,
            products: data.store_products(store_id),
        })
    }

    async fn latest_snapshot(
        &self,
        store_id: StoreId,
    ) -> Result<Option<InventorySnapshot>, RepositoryError> {
        Ok(self.data.read().await.snapshots.get(&store_id).cloned())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn cart(
        &self,
        customer_id: CustomerId,
        store_id: StoreId,
    ) -> Result<Cart, RepositoryError> {
        Ok(self.data.read().await.cart(customer_id, store_id))
    }

    async fn write_item(
        &self,
        customer_id: CustomerId,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, CartWriteError> {
        let mut data = self.data.write().await;
        let key = (customer_id, store_id);

        if write == LineWrite::Set(0) {
            if let Some(lines) = data.carts.get_mut(&key) {
                lines.retain(|line| line.product_id != product_id);
            }
            return Ok(data.cart(customer_id, store_id));
        }

        let product = data
            .products
            .get(&product_id)
            .filter(|p| p.store_id == store_id)
            .cloned()
            .ok_or(CartWriteError::ProductNotFound(product_id))?;
        let current = data
            .carts
            .get(&key)
            .and_then(|lines| lines.iter().find(|line| line.product_id == product_id))
            .map_or(0, |line| line.quantity);
        let quantity = write.resulting_quantity(current);

        if quantity > product.quantity {
            return Err(CartWriteError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.quantity,
            });
        }

        data.next_cart_item_id += 1;
        let cart_item_id = CartItemId::new(data.next_cart_item_id);
        let lines = data.carts.entry(key).or_default();
        if quantity == 0 {
            lines.retain(|line| line.product_id != product_id);
        } else if let Some(line) = lines.iter_mut().find(|line| line.product_id == product_id) {
            let id = line.cart_item_id;
            *line = CartLine::for_product(&product, quantity);
            line.cart_item_id = id;
        } else {
            let mut line = CartLine::for_product(&product, quantity);
            line.cart_item_id = Some(cart_item_id);
            lines.push(line);
        }

        Ok(data.cart(customer_id, store_id))
    }
}

#[async_trait]
impl DeviceTokenRepository for MemoryStore {
    async fn register(
        &self,
        token: &DeviceToken,
        customer_id: Option<CustomerId>,
    ) -> Result<bool, RepositoryError> {
        let mut data = self.data.write().await;
        match data.device_tokens.get_mut(token.as_str()) {
            Some(bound) => {
                if customer_id.is_some() {
                    *bound = customer_id;
                }
                Ok(false)
            }
            None => {
                data.device_tokens
                    .insert(token.as_str().to_owned(), customer_id);
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn principal(&self, token: &str) -> Result<Option<Principal>, RepositoryError> {
        Ok(self.data.read().await.sessions.get(token).copied())
    }

    async fn create(&self, token: &str, principal: Principal) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        if data.sessions.contains_key(token) {
            return Err(RepositoryError::Conflict("session token already exists".to_string()));
        }
        data.sessions.insert(token.to_owned(), principal);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopfront_core::UnitPrice;

    use super::*;

    fn row(name: &str, quantity: u32) -> ValidatedRow {
        ValidatedRow {
            name: name.to_string(),
            unit_price: UnitPrice::new(Decimal::new(500, 2)).unwrap(),
            description: None,
            quantity,
            image_url: None,
        }
    }

    fn snapshot() -> InventorySnapshot {
        InventorySnapshot {
            source_name: "recount.xlsx".to_string(),
            last_updated: Utc::now(),
        }
    }

    const STORE: StoreId = StoreId::new(1);
    const ALICE: CustomerId = CustomerId::new(7);

    #[tokio::test]
    async fn test_merge_sets_quantity_by_name() {
        let store = MemoryStore::new();
        store.create_product(STORE, &row("Widget", 20)).await.unwrap();

        let outcome = store
            .merge_catalog(STORE, &[row("Widget", 5), row("Gadget", 1)], &snapshot())
            .await
            .unwrap();

        assert_eq!((outcome.inserted, outcome.updated, outcome.removed), (1, 1, 0));
        let widget = outcome.products.iter().find(|p| p.name == "Widget").unwrap();
        assert_eq!(widget.quantity, 5);
    }

    #[tokio::test]
    async fn test_replace_only_touches_one_store() {
        let store = MemoryStore::new();
        store.create_product(STORE, &row("Widget", 20)).await.unwrap();
        store
            .create_product(StoreId::new(2), &row("Widget", 3))
            .await
            .unwrap();

        let outcome = store
            .replace_catalog(STORE, &[row("Gizmo", 4)], &snapshot())
            .await
            .unwrap();

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(store.list_products(StoreId::new(2)).await.unwrap().len(), 1);
        assert!(store.latest_snapshot(STORE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let store = MemoryStore::new();
        store.create_product(STORE, &row("Widget", 1)).await.unwrap();
        let err = store.create_product(STORE, &row("Widget", 2)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cart_write_checks_resulting_quantity() {
        let store = MemoryStore::new();
        let widget = store.create_product(STORE, &row("Widget", 5)).await.unwrap();

        store
            .write_item(ALICE, STORE, widget.id, LineWrite::Add(3))
            .await
            .unwrap();
        let err = store
            .write_item(ALICE, STORE, widget.id, LineWrite::Add(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CartWriteError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }
        ));

        let cart = store
            .write_item(ALICE, STORE, widget.id, LineWrite::Add(2))
            .await
            .unwrap();
        assert_eq!(cart.lines()[0].quantity, 5);
        assert!(cart.lines()[0].cart_item_id.is_some());
    }

    #[tokio::test]
    async fn test_deleted_product_line_reads_out_of_stock() {
        let store = MemoryStore::new();
        let widget = store.create_product(STORE, &row("Widget", 5)).await.unwrap();
        store
            .write_item(ALICE, STORE, widget.id, LineWrite::Set(2))
            .await
            .unwrap();
        store.delete_product(STORE, widget.id).await.unwrap();

        let cart = store.cart(ALICE, STORE).await.unwrap();
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.lines()[0].stock_at_read, 0);
        assert_eq!(cart.lines()[0].name, "Widget");

        // Removing needs no product.
        let cart = store
            .write_item(ALICE, STORE, widget.id, LineWrite::Set(0))
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_device_token_keeps_customer_binding() {
        let store = MemoryStore::new();
        let token = DeviceToken::new("device-a").unwrap();
        assert!(store.register(&token, Some(ALICE)).await.unwrap());
        assert!(!store.register(&token, None).await.unwrap());
        assert_eq!(
            store.data.read().await.device_tokens.get("device-a").copied(),
            Some(Some(ALICE))
        );
    }
}

use std::sync::Arc;
use std::time::Duration;

use shopfront_core::{
    AdjustmentKind, Cart, Credential, LineWrite, Product, ProductId, StockWarning, StoreId,
};
use tracing::{debug, info, instrument, warn};

use super::{
    AdmissionPolicy, CartStore, CartUpdate, CartView, ItemRef, LocalCartStore, MergeFailure,
    MergeReport, MergedLine, RemoteCartStore, validate_quantity, with_single_retry,
};
use crate::auth::Shopper;
use crate::error::EngineError;
use crate::ledger::StockLedger;
use crate::remote::CartApi;

/// Routes cart operations to the shopper's store and merges carts on sign-in.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct CartReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    local: Arc<LocalCartStore>,
    api: Arc<dyn CartApi>,
    ledger: Arc<dyn StockLedger>,
    retry_delay: Duration,
    policy: AdmissionPolicy,
}

impl CartReconciler {
    #[must_use]
    pub fn new(
        local: Arc<LocalCartStore>,
        api: Arc<dyn CartApi>,
        ledger: Arc<dyn StockLedger>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ReconcilerInner {
                local,
                api,
                ledger,
                retry_delay,
                policy: AdmissionPolicy::default(),
            }),
        }
    }

    /// The store that holds `shopper`'s carts.
    #[must_use]
    pub fn store_for(&self, shopper: &Shopper) -> Arc<dyn CartStore> {
        match shopper {
            Shopper::Anonymous => Arc::clone(&self.inner.local) as Arc<dyn CartStore>,
            Shopper::Authenticated(credential) => Arc::new(RemoteCartStore::new(
                Arc::clone(&self.inner.api),
                credential.clone(),
            )),
        }
    }

    /// Read the shopper's cart for a store.
    ///
    /// Local carts are re-checked against the stock ledger: lines above the
    /// current stock are lowered (and the lowered cart is saved), lines whose
    /// product is out of stock or gone are flagged.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be read.
    #[instrument(skip(self, shopper), fields(authenticated = shopper.is_authenticated()))]
    pub async fn cart(&self, shopper: &Shopper, store_id: StoreId) -> Result<CartView, EngineError> {
        let store = self.store_for(shopper);
        let mut cart = store.load(store_id).await?;

        if shopper.is_authenticated() || cart.is_empty() {
            return Ok(CartView {
                cart,
                adjustments: Vec::new(),
                stock_checked: shopper.is_authenticated(),
            });
        }

        let snapshot = match self.inner.ledger.snapshot(store_id).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_transient() => {
                warn!(error = %err, "Stock unavailable; returning unchecked cart");
                return Ok(CartView {
                    cart,
                    adjustments: Vec::new(),
                    stock_checked: false,
                });
            }
            Err(err) => return Err(err),
        };

        let adjustments = cart.reconcile_stock(|product_id| snapshot.quantity(product_id));
        for adjustment in &adjustments {
            warn!(
                product_id = %adjustment.product_id,
                kind = ?adjustment.kind,
                previous = adjustment.previous_quantity,
                quantity = adjustment.quantity,
                available = adjustment.available,
                "Cart line adjusted to stock"
            );
        }
        if adjustments
            .iter()
            .any(|adjustment| adjustment.kind == AdjustmentKind::Clamped)
        {
            self.inner.local.replace_lines(store_id, &cart).await?;
        }

        Ok(CartView {
            cart,
            adjustments,
            stock_checked: true,
        })
    }

    /// Add `quantity` units of `product` to the shopper's cart.
    ///
    /// Adding beyond the product's visible stock succeeds with a warning.
    /// Remote adds read the current line first so that their single retry
    /// is idempotent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for quantities below one,
    /// `InsufficientStock` if the backend refuses the write, and
    /// `RemoteUnavailable` if the backend cannot be reached after one retry.
    #[instrument(skip(self, shopper, product), fields(product_id = %product.id))]
    pub async fn add_item(
        &self,
        shopper: &Shopper,
        store_id: StoreId,
        product: &Product,
        quantity: i64,
    ) -> Result<CartUpdate, EngineError> {
        let quantity = validate_quantity(quantity)?;
        if product.store_id != store_id {
            return Err(EngineError::StoreMismatch {
                product_id: product.id,
                expected: store_id,
                actual: product.store_id,
            });
        }

        let store = self.store_for(shopper);
        let cart = match shopper {
            Shopper::Anonymous => {
                store
                    .apply(store_id, product, LineWrite::Add(quantity))
                    .await?
            }
            Shopper::Authenticated(_) => {
                self.add_remote(store.as_ref(), store_id, product, quantity)
                    .await?
            }
        };

        Ok(self.update(cart, product.id))
    }

    /// Remote add with one retry that cannot apply the units twice.
    ///
    /// A timed-out `Add` may already be committed, so the retry sends
    /// `Set(base + quantity)` computed from the line read before the write.
    async fn add_remote(
        &self,
        store: &dyn CartStore,
        store_id: StoreId,
        product: &Product,
        quantity: u32,
    ) -> Result<Cart, EngineError> {
        let base = store
            .load(store_id)
            .await?
            .line(product.id)
            .map_or(0, |line| line.quantity);

        match store
            .apply(store_id, product, LineWrite::Add(quantity))
            .await
        {
            Err(err) if err.is_transient() => {
                let target = base
                    .checked_add(quantity)
                    .ok_or(EngineError::InvalidQuantity(i64::from(quantity)))?;
                warn!(
                    error = %err,
                    delay = ?self.inner.retry_delay,
                    target,
                    "Remote add failed; retrying once as a set"
                );
                tokio::time::sleep(self.inner.retry_delay).await;
                store
                    .apply(store_id, product, LineWrite::Set(target))
                    .await
            }
            other => other,
        }
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for quantities below one, `NotFound` if the
    /// cart has no such line, and the remote errors of
    /// [`CartReconciler::add_item`].
    #[instrument(skip(self, shopper))]
    pub async fn update_quantity(
        &self,
        shopper: &Shopper,
        item: ItemRef,
        quantity: i64,
    ) -> Result<CartUpdate, EngineError> {
        let quantity = validate_quantity(quantity)?;
        let store = self.store_for(shopper);
        let cart = match shopper {
            Shopper::Anonymous => {
                store
                    .set_quantity(item.store_id, item.product_id, quantity)
                    .await?
            }
            Shopper::Authenticated(_) => {
                with_single_retry(self.inner.retry_delay, || {
                    store.set_quantity(item.store_id, item.product_id, quantity)
                })
                .await?
            }
        };

        Ok(self.update(cart, item.product_id))
    }

    /// Remove a line. Removing an absent line succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    #[instrument(skip(self, shopper))]
    pub async fn remove_item(&self, shopper: &Shopper, item: ItemRef) -> Result<Cart, EngineError> {
        self.store_for(shopper)
            .remove(item.store_id, item.product_id)
            .await
    }

    /// Empty the shopper's cart for a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    #[instrument(skip(self, shopper))]
    pub async fn clear(&self, shopper: &Shopper, store_id: StoreId) -> Result<Cart, EngineError> {
        self.store_for(shopper).clear(store_id).await
    }

    /// Fold the local cart for `store_id` into the shopper's remote cart.
    ///
    /// Every local line is sent as an additive upsert, in local order. Each
    /// line is removed from the device as soon as its upsert succeeds; lines
    /// that fail stay local for the next attempt. The merge runs on its own
    /// task, so dropping the returned future does not interrupt it.
    ///
    /// # Errors
    ///
    /// Returns an error only if local storage fails; remote failures are
    /// reported per line in the [`MergeReport`].
    #[instrument(skip(self, credential))]
    pub async fn merge_on_authentication(
        &self,
        credential: &Credential,
        store_id: StoreId,
    ) -> Result<MergeReport, EngineError> {
        let this = self.clone();
        let credential = credential.clone();
        tokio::spawn(async move { this.merge_local_lines(&credential, store_id).await }).await?
    }

    async fn merge_local_lines(
        &self,
        credential: &Credential,
        store_id: StoreId,
    ) -> Result<MergeReport, EngineError> {
        let local_cart = self.inner.local.load(store_id).await?;
        let mut report = MergeReport::default();
        if local_cart.is_empty() {
            debug!("No local cart to merge");
            return Ok(report);
        }

        info!(lines = local_cart.len(), "Merging local cart into remote cart");
        for line in local_cart.into_lines() {
            let result = self
                .inner
                .api
                .write_item(
                    credential,
                    store_id,
                    line.product_id,
                    LineWrite::Add(line.quantity),
                )
                .await;

            match result {
                Ok(cart) => {
                    self.inner
                        .local
                        .take(store_id, line.product_id, line.quantity)
                        .await?;
                    report.merged.push(MergedLine {
                        product_id: line.product_id,
                        quantity: line.quantity,
                    });
                    report.cart = Some(cart);
                }
                Err(err) => {
                    let error = EngineError::from(err);
                    warn!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %error,
                        "Cart line kept locally after failed merge"
                    );
                    let stop = matches!(error, EngineError::AuthenticationRequired);
                    report.failed.push(MergeFailure {
                        product_id: line.product_id,
                        quantity: line.quantity,
                        error,
                    });
                    if stop {
                        break;
                    }
                }
            }
        }

        info!(
            merged = report.merged.len(),
            failed = report.failed.len(),
            "Cart merge finished"
        );
        Ok(report)
    }

    fn update(&self, cart: Cart, product_id: ProductId) -> CartUpdate {
        let warnings: Vec<StockWarning> = match self.inner.policy {
            AdmissionPolicy::Advisory => stock_warning(&cart, product_id).into_iter().collect(),
        };
        for warning in &warnings {
            warn!(
                product_id = %warning.product_id,
                requested = warning.requested,
                available = warning.available,
                "Cart line exceeds visible stock"
            );
        }
        CartUpdate { cart, warnings }
    }
}

fn stock_warning(cart: &Cart, product_id: ProductId) -> Option<StockWarning> {
    let line = cart.line(product_id)?;
    (line.quantity > line.stock_at_read).then_some(StockWarning {
        product_id,
        requested: line.quantity,
        available: line.stock_at_read,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::kv::{KeyValueStore, MemoryKeyValueStore};
    use crate::ledger::CatalogStockLedger;
    use crate::testing::{Failure, FakeBackend, credential, product};

    const RETRY: Duration = Duration::from_millis(500);

    struct Harness {
        backend: Arc<FakeBackend>,
        kv: Arc<MemoryKeyValueStore>,
        reconciler: CartReconciler,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::new());
        for id in 1..=3 {
            backend.put_product(product(id, 1, 10));
        }
        let kv = Arc::new(MemoryKeyValueStore::new());
        let local = Arc::new(LocalCartStore::new(kv.clone()));
        let ledger = Arc::new(CatalogStockLedger::new(
            backend.clone(),
            Duration::from_secs(30),
        ));
        let reconciler = CartReconciler::new(local, backend.clone(), ledger, RETRY);
        Harness {
            backend,
            kv,
            reconciler,
        }
    }

    fn store() -> StoreId {
        StoreId::new(1)
    }

    fn alice() -> Shopper {
        Shopper::Authenticated(credential("alice"))
    }

    #[tokio::test]
    async fn test_anonymous_add_accumulates() {
        let h = harness();
        let p = product(1, 1, 10);
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &p, 2)
            .await
            .unwrap();
        let update = h
            .reconciler
            .add_item(&Shopper::Anonymous, store(), &p, 3)
            .await
            .unwrap();
        assert_eq!(update.cart.line(p.id).unwrap().quantity, 5);
        assert!(update.warnings.is_empty());
        assert!(h.kv.get("cart_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_quantity_leaves_cart_unchanged() {
        let h = harness();
        let p = product(1, 1, 10);
        for quantity in [0, -1] {
            let err = h
                .reconciler
                .add_item(&Shopper::Anonymous, store(), &p, quantity)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidQuantity(_)));
        }
        assert_eq!(h.kv.get("cart_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_anonymous_add_beyond_stock_warns() {
        let h = harness();
        let p = product(1, 1, 2);
        let update = h
            .reconciler
            .add_item(&Shopper::Anonymous, store(), &p, 3)
            .await
            .unwrap();
        assert_eq!(update.cart.line(p.id).unwrap().quantity, 3);
        assert_eq!(
            update.warnings,
            vec![StockWarning {
                product_id: p.id,
                requested: 3,
                available: 2
            }]
        );
    }

    #[tokio::test]
    async fn test_store_mismatch_rejected() {
        let h = harness();
        let err = h
            .reconciler
            .add_item(&Shopper::Anonymous, StoreId::new(2), &product(1, 1, 10), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StoreMismatch { .. }));
    }

    #[tokio::test]
    async fn test_read_clamps_after_stock_decrease() {
        let h = harness();
        let p = product(1, 1, 10);
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &p, 5)
            .await
            .unwrap();
        h.backend.set_stock(p.id, 2);
        h.backend.remove_product(ProductId::new(2));
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &product(2, 1, 10), 1)
            .await
            .unwrap();

        let view = h.reconciler.cart(&Shopper::Anonymous, store()).await.unwrap();
        assert!(view.stock_checked);
        assert_eq!(view.cart.line(p.id).unwrap().quantity, 2);
        assert_eq!(view.adjustments.len(), 2);
        assert_eq!(view.adjustments[0].kind, AdjustmentKind::Clamped);
        assert_eq!(view.adjustments[1].kind, AdjustmentKind::Unavailable);

        // The clamp was saved; the flagged line was kept.
        let stored = h
            .reconciler
            .store_for(&Shopper::Anonymous)
            .load(store())
            .await
            .unwrap();
        assert_eq!(stored.line(p.id).unwrap().quantity, 2);
        assert_eq!(stored.line(ProductId::new(2)).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_read_without_ledger_is_unchecked() {
        let h = harness();
        let p = product(1, 1, 10);
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &p, 1)
            .await
            .unwrap();
        h.backend.fail_next(Failure::Unavailable);
        let view = h.reconciler.cart(&Shopper::Anonymous, store()).await.unwrap();
        assert!(!view.stock_checked);
        assert_eq!(view.cart.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_local_line() {
        let h = harness();
        let err = h
            .reconciler
            .update_quantity(
                &Shopper::Anonymous,
                ItemRef::new(store(), ProductId::new(1)),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_anonymous_operations_fold_into_persisted_cart() {
        enum Op {
            Add(i32, i64),
            Update(i32, i64),
            Remove(i32),
        }

        let h = harness();
        let ops = [
            Op::Add(1, 2),
            Op::Add(2, 1),
            Op::Update(1, 5),
            Op::Add(3, 4),
            Op::Remove(2),
            Op::Add(1, 1),
            Op::Add(2, 3),
            Op::Update(3, 1),
        ];

        let mut expected: Vec<(i32, u32)> = Vec::new();
        for op in ops {
            match op {
                Op::Add(id, quantity) => {
                    h.reconciler
                        .add_item(&Shopper::Anonymous, store(), &product(id, 1, 10), quantity)
                        .await
                        .unwrap();
                    let quantity = u32::try_from(quantity).unwrap();
                    if let Some(line) = expected.iter_mut().find(|(p, _)| *p == id) {
                        line.1 += quantity;
                    } else {
                        expected.push((id, quantity));
                    }
                }
                Op::Update(id, quantity) => {
                    h.reconciler
                        .update_quantity(
                            &Shopper::Anonymous,
                            ItemRef::new(store(), ProductId::new(id)),
                            quantity,
                        )
                        .await
                        .unwrap();
                    let line = expected.iter_mut().find(|(p, _)| *p == id).unwrap();
                    line.1 = u32::try_from(quantity).unwrap();
                }
                Op::Remove(id) => {
                    h.reconciler
                        .remove_item(&Shopper::Anonymous, ItemRef::new(store(), ProductId::new(id)))
                        .await
                        .unwrap();
                    expected.retain(|(p, _)| *p != id);
                }
            }
        }

        let persisted = LocalCartStore::new(h.kv.clone()).load(store()).await.unwrap();
        let actual: Vec<(i32, u32)> = persisted
            .lines()
            .iter()
            .map(|line| (line.product_id.as_i32(), line.quantity))
            .collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_remove_and_clear_local() {
        let h = harness();
        let item = ItemRef::new(store(), ProductId::new(1));
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &product(1, 1, 10), 1)
            .await
            .unwrap();
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &product(2, 1, 10), 1)
            .await
            .unwrap();

        let cart = h
            .reconciler
            .remove_item(&Shopper::Anonymous, item)
            .await
            .unwrap();
        assert_eq!(cart.len(), 1);
        h.reconciler
            .remove_item(&Shopper::Anonymous, item)
            .await
            .unwrap();

        let cart = h.reconciler.clear(&Shopper::Anonymous, store()).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(h.kv.get("cart_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_authenticated_add_goes_remote() {
        let h = harness();
        let p = product(1, 1, 10);
        let update = h.reconciler.add_item(&alice(), store(), &p, 2).await.unwrap();
        assert_eq!(update.cart.line(p.id).unwrap().quantity, 2);
        assert!(update.cart.line(p.id).unwrap().cart_item_id.is_some());
        assert_eq!(h.kv.get("cart_1").await.unwrap(), None);
        assert_eq!(h.backend.cart("alice", store()).total_quantity(), 2);
    }

    #[tokio::test]
    async fn test_authenticated_add_insufficient_stock() {
        let h = harness();
        let p = product(1, 1, 10);
        h.backend.set_stock(p.id, 1);
        let err = h.reconciler.add_item(&alice(), store(), &p, 2).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(h.backend.cart_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_add_retries_once() {
        let h = harness();
        let p = product(1, 1, 10);
        h.backend.fail_next_write(Failure::Timeout);
        let update = h.reconciler.add_item(&alice(), store(), &p, 1).await.unwrap();
        assert_eq!(update.cart.total_quantity(), 1);
        assert_eq!(h.backend.cart_writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_add_lost_response_not_applied_twice() {
        let h = harness();
        let p = product(1, 1, 10);
        h.backend.seed_cart("alice", store(), p.id, 1);
        h.backend.lose_next_write_response();

        let update = h.reconciler.add_item(&alice(), store(), &p, 2).await.unwrap();

        assert_eq!(update.cart.line(p.id).unwrap().quantity, 3);
        assert_eq!(h.backend.cart("alice", store()).line(p.id).unwrap().quantity, 3);
        assert_eq!(h.backend.cart_writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_add_gives_up_after_retry() {
        let h = harness();
        let p = product(1, 1, 10);
        h.backend.fail_next_write(Failure::Timeout);
        h.backend.fail_next_write(Failure::Unavailable);
        let err = h.reconciler.add_item(&alice(), store(), &p, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::RemoteUnavailable(_)));
        assert_eq!(h.backend.cart_writes(), 2);
        assert!(h.backend.cart("alice", store()).is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_update_and_clear() {
        let h = harness();
        h.backend.seed_cart("alice", store(), ProductId::new(1), 1);
        h.backend.seed_cart("alice", store(), ProductId::new(2), 4);
        let item = ItemRef::new(store(), ProductId::new(1));

        let update = h.reconciler.update_quantity(&alice(), item, 3).await.unwrap();
        assert_eq!(update.cart.line(item.product_id).unwrap().quantity, 3);

        let cart = h.reconciler.clear(&alice(), store()).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_update_missing_line() {
        let h = harness();
        let item = ItemRef::new(store(), ProductId::new(1));

        let err = h
            .reconciler
            .update_quantity(&alice(), item, 3)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(h.backend.cart("alice", store()).is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_surfaces_as_authentication_required() {
        let h = harness();
        h.backend.fail_next(Failure::Unauthorized);
        let err = h.reconciler.cart(&alice(), store()).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn test_merge_sums_quantities() {
        let h = harness();
        let a = product(1, 1, 10);
        let b = product(2, 1, 10);
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &a, 2)
            .await
            .unwrap();
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &b, 1)
            .await
            .unwrap();
        h.backend.seed_cart("alice", store(), b.id, 3);

        let report = h
            .reconciler
            .merge_on_authentication(&credential("alice"), store())
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.merged.len(), 2);
        let cart = report.cart.unwrap();
        assert_eq!(cart.line(a.id).unwrap().quantity, 2);
        assert_eq!(cart.line(b.id).unwrap().quantity, 4);
        assert_eq!(h.kv.get("cart_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_merge_keeps_failed_lines_local() {
        let h = harness();
        let a = product(1, 1, 10);
        let b = product(2, 1, 10);
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &a, 2)
            .await
            .unwrap();
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &b, 1)
            .await
            .unwrap();
        h.backend.fail_product(b.id, Failure::Timeout);

        let report = h
            .reconciler
            .merge_on_authentication(&credential("alice"), store())
            .await
            .unwrap();
        assert_eq!(report.merged, vec![MergedLine {
            product_id: a.id,
            quantity: 2
        }]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].error,
            EngineError::RemoteUnavailable(_)
        ));

        let local = h
            .reconciler
            .cart(&Shopper::Anonymous, store())
            .await
            .unwrap()
            .cart;
        assert_eq!(local.len(), 1);
        assert_eq!(local.line(b.id).unwrap().quantity, 1);

        // A later sign-in retries only what is left.
        h.backend.heal_product(b.id);
        let report = h
            .reconciler
            .merge_on_authentication(&credential("alice"), store())
            .await
            .unwrap();
        assert!(report.is_complete());
        let remote = h.backend.cart("alice", store());
        assert_eq!(remote.line(a.id).unwrap().quantity, 2);
        assert_eq!(remote.line(b.id).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_merge_insufficient_stock_stays_local() {
        let h = harness();
        let a = product(1, 1, 10);
        h.reconciler
            .add_item(&Shopper::Anonymous, store(), &a, 4)
            .await
            .unwrap();
        h.backend.set_stock(a.id, 3);

        let report = h
            .reconciler
            .merge_on_authentication(&credential("alice"), store())
            .await
            .unwrap();
        assert!(!report.is_complete());
        assert!(matches!(
            report.failed[0].error,
            EngineError::InsufficientStock { available: 3, .. }
        ));
        assert!(h.kv.get("cart_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_merge_with_empty_local_cart() {
        let h = harness();
        let report = h
            .reconciler
            .merge_on_authentication(&credential("alice"), store())
            .await
            .unwrap();
        assert!(report.merged.is_empty());
        assert!(report.cart.is_none());
        assert_eq!(h.backend.cart_writes(), 0);
    }
}

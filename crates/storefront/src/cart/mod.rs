//! Cart reconciliation between the device and the backend.
//!
//! Anonymous shoppers keep one cart per store on the device
//! ([`LocalCartStore`]); authenticated shoppers use the backend's cart
//! ([`RemoteCartStore`]). [`CartReconciler`] routes every operation to the
//! right store and folds the local cart into the remote one on sign-in.

mod reconciler;
mod store;

pub use reconciler::CartReconciler;
pub use store::{CartStore, LocalCartStore, RemoteCartStore};

use std::future::Future;
use std::time::Duration;

use shopfront_core::{Cart, ProductId, StockAdjustment, StockWarning, StoreId};

use crate::error::EngineError;

/// Addresses one line in either store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub store_id: StoreId,
    pub product_id: ProductId,
}

impl ItemRef {
    #[must_use]
    pub const fn new(store_id: StoreId, product_id: ProductId) -> Self {
        Self {
            store_id,
            product_id,
        }
    }
}

/// How stock is enforced when a shopper adds an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Adding beyond visible stock succeeds with a warning; checkout is the
    /// real gate.
    #[default]
    Advisory,
}

/// Result of a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUpdate {
    pub cart: Cart,
    pub warnings: Vec<StockWarning>,
}

/// Result of a cart read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub cart: Cart,
    /// Local lines lowered or flagged by the stock re-read.
    pub adjustments: Vec<StockAdjustment>,
    /// Whether stock was re-read for this view.
    pub stock_checked: bool,
}

/// A local line that reached the remote cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A local line that stayed on the device.
#[derive(Debug)]
pub struct MergeFailure {
    pub product_id: ProductId,
    pub quantity: u32,
    pub error: EngineError,
}

/// Outcome of folding the local cart into the remote cart.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub merged: Vec<MergedLine>,
    pub failed: Vec<MergeFailure>,
    /// Remote cart as returned by the last successful upsert.
    pub cart: Option<Cart>,
}

impl MergeReport {
    /// Whether every local line reached the remote cart.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Check a shopper-supplied quantity.
///
/// # Errors
///
/// Returns `EngineError::InvalidQuantity` unless `1 <= quantity <= u32::MAX`.
pub fn validate_quantity(quantity: i64) -> Result<u32, EngineError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(EngineError::InvalidQuantity(quantity))
}

/// Run `op`, retrying once after `delay` if it failed transiently.
pub(crate) async fn with_single_retry<T, F, Fut>(delay: Duration, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, EngineError>> + Send,
{
    match op().await {
        Err(err) if err.is_transient() => {
            tracing::warn!(error = %err, ?delay, "Remote cart call failed; retrying once");
            tokio::time::sleep(delay).await;
            op().await
        }
        other => other,
    }
}

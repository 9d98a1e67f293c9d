//! Engine error taxonomy.

use shopfront_core::{ProductId, StoreId};
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors surfaced by cart, stock and notification operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A requested quantity was zero, negative or out of range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The backend refused a write because stock is too low.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The product does not belong to the store the cart was addressed to.
    #[error("Product {product_id} belongs to store {actual}, not {expected}")]
    StoreMismatch {
        product_id: ProductId,
        expected: StoreId,
        actual: StoreId,
    },

    /// The backend could not be reached or failed after the retry.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The backend rejected the shopper's credential.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The backend answered 2xx with a body that could not be read. The
    /// request may have been applied, so it is never retried.
    #[error("Unreadable backend response: {0}")]
    InvalidResponse(String),

    /// The backend rejected the request for another reason.
    #[error("Rejected by backend ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// No cart line exists for the referenced product.
    #[error("No cart line for product {product_id} in store {store_id}")]
    NotFound {
        store_id: StoreId,
        product_id: ProductId,
    },

    /// Reading or writing device-local storage failed.
    #[error("Local storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A device-local value could not be decoded.
    #[error("Corrupt local value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Whether a single retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

impl From<RemoteError> for EngineError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized => Self::AuthenticationRequired,
            RemoteError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            RemoteError::Rejected { status, message } => Self::Rejected { status, message },
            RemoteError::Decode(message) => Self::InvalidResponse(message),
            RemoteError::Timeout | RemoteError::Network(_) | RemoteError::Server { .. } => {
                Self::RemoteUnavailable(err.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

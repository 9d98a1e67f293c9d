//! Shopfront storefront engine.
//!
//! The shopper-side half of Shopfront: it keeps anonymous carts on the
//! device, routes signed-in shoppers to the backend's authoritative cart,
//! folds the two together on sign-in, re-checks local carts against current
//! stock, and registers push notification tokens once the shopper is known.
//!
//! # Modules
//!
//! - [`cart`] - Local and remote cart stores and the reconciler
//! - [`ledger`] - Cached stock snapshots
//! - [`notifications`] - Device token state machine
//! - [`remote`] - Backend transport
//! - [`kv`] - Device-local persistence
//! - [`session`] - Sign-in reactions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cart;
pub mod config;
pub mod engine;
pub mod error;
pub mod kv;
pub mod ledger;
pub mod notifications;
pub mod remote;
pub mod session;

#[cfg(test)]
mod testing;

pub use auth::{AuthChannel, Shopper};
pub use cart::{CartReconciler, CartUpdate, CartView, ItemRef, MergeReport};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use notifications::NotificationTokenManager;

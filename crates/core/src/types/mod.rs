//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for the storefront's domain concepts.

pub mod cart;
pub mod credential;
pub mod device;
pub mod id;
pub mod inventory;
pub mod price;
pub mod product;
pub mod wire;

pub use cart::{AdjustmentKind, Cart, CartLine, LineWrite, StockAdjustment, StockWarning};
pub use credential::Credential;
pub use device::{DeviceToken, RegistrationState};
pub use id::*;
pub use inventory::{IngestMode, IngestReport, InventoryRow, InventorySnapshot, LowStockEntry};
pub use price::{PriceError, UnitPrice};
pub use product::{Product, ProductInput, ProductPatch};
pub use wire::{CartItemRequest, DeviceTokenRequest, ErrorBody, IngestRequest, WriteMode};

//! Shopfront Core - Shared types library.
//!
//! This crate provides the domain types used across all Shopfront components:
//! - `storefront` - Shopper-device cart and notification-token engine
//! - `server` - Backend holding catalogs, authoritative carts and device tokens
//! - `cli` - Command-line tools for migrations and catalog ingest
//!
//! # Architecture
//!
//! The core crate contains only types, pure cart arithmetic and field
//! validation - no I/O, no database access, no HTTP clients. Validation lives
//! here so that single-product CRUD and bulk inventory ingest apply exactly the
//! same rules.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, products, inventory rows, carts, device tokens
//! - [`validation`] - Shared product field validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{
    FieldError, RowError, RowErrors, ValidatedPatch, ValidatedRow, validate_rows,
};

//! Request extractors.

pub mod auth;

pub use auth::{OptionalCustomer, RequireCustomer, RequireMerchant};

//! Bearer session commands for operators and testing.
//!
//! # Usage
//!
//! ```bash
//! # Session for the merchant of store 1, with a generated token
//! shopfront-cli session create --merchant 1
//!
//! # Session for customer 42 with a chosen token
//! shopfront-cli session create --customer 42 --token dev-customer
//! ```

use shopfront_core::{CustomerId, StoreId};
use shopfront_server::db::{PgSessionRepository, Principal, SessionRepository};

use super::{CommandError, connect};

/// Pick the principal from the mutually exclusive flags.
#[must_use]
pub fn principal(merchant: Option<StoreId>, customer: Option<CustomerId>) -> Option<Principal> {
    match (merchant, customer) {
        (Some(store_id), None) => Some(Principal::Merchant(store_id)),
        (None, Some(customer_id)) => Some(Principal::Customer(customer_id)),
        _ => None,
    }
}

/// Insert a session row and print its token.
///
/// # Errors
///
/// Returns `CommandError::Repository` if the token is already in use.
pub async fn create(token: Option<String>, principal: Principal) -> Result<(), CommandError> {
    let token = token.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let pool = connect().await?;

    PgSessionRepository::new(pool)
        .create(&token, principal)
        .await?;
    tracing::info!(?principal, "Session created");

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_requires_exactly_one() {
        assert_eq!(
            principal(Some(StoreId::new(1)), None),
            Some(Principal::Merchant(StoreId::new(1)))
        );
        assert_eq!(
            principal(None, Some(CustomerId::new(9))),
            Some(Principal::Customer(CustomerId::new(9)))
        );
        assert_eq!(principal(None, None), None);
        assert_eq!(principal(Some(StoreId::new(1)), Some(CustomerId::new(9))), None);
    }
}

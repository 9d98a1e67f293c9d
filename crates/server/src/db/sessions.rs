//! `PostgreSQL` bearer session repository.

use async_trait::async_trait;
use shopfront_core::{CustomerId, StoreId};
use sqlx::PgPool;

use super::{Principal, RepositoryError, SessionRepository};

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    principal_kind: String,
    store_id: Option<i32>,
    customer_id: Option<i32>,
}

impl TryFrom<SessionRow> for Principal {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        match (row.principal_kind.as_str(), row.store_id, row.customer_id) {
            ("merchant", Some(store_id), _) => Ok(Self::Merchant(StoreId::new(store_id))),
            ("customer", _, Some(customer_id)) => {
                Ok(Self::Customer(CustomerId::new(customer_id)))
            }
            (kind, _, _) => Err(RepositoryError::DataCorruption(format!(
                "session with principal kind {kind:?} is missing its id"
            ))),
        }
    }
}

/// Session repository backed by the `api_sessions` table.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn principal(&self, token: &str) -> Result<Option<Principal>, RepositoryError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT principal_kind, store_id, customer_id FROM api_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Principal::try_from).transpose()
    }

    async fn create(&self, token: &str, principal: Principal) -> Result<(), RepositoryError> {
        let (kind, store_id, customer_id) = match principal {
            Principal::Merchant(store_id) => ("merchant", Some(store_id), None),
            Principal::Customer(customer_id) => ("customer", None, Some(customer_id)),
        };

        sqlx::query(
            r"
            INSERT INTO api_sessions (token, principal_kind, store_id, customer_id)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(token)
        .bind(kind)
        .bind(store_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "session token"))?;

        Ok(())
    }
}

//! `PostgreSQL` device token repository.

use async_trait::async_trait;
use shopfront_core::{CustomerId, DeviceToken};
use sqlx::PgPool;

use super::{DeviceTokenRepository, RepositoryError};

/// Device token repository backed by the `device_tokens` table.
#[derive(Clone)]
pub struct PgDeviceTokenRepository {
    pool: PgPool,
}

impl PgDeviceTokenRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceTokenRepository for PgDeviceTokenRepository {
    async fn register(
        &self,
        token: &DeviceToken,
        customer_id: Option<CustomerId>,
    ) -> Result<bool, RepositoryError> {
        // xmax is zero only for a freshly inserted row.
        let (created,): (bool,) = sqlx::query_as(
            r"
            INSERT INTO device_tokens (token, customer_id)
            VALUES ($1, $2)
            ON CONFLICT (token) DO UPDATE
            SET customer_id = COALESCE(EXCLUDED.customer_id, device_tokens.customer_id),
                updated_at = NOW()
            RETURNING (xmax = 0) AS created
            ",
        )
        .bind(token.as_str())
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

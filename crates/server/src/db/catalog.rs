//! `PostgreSQL` catalog repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopfront_core::{
    InventorySnapshot, Product, ProductId, StoreId, UnitPrice, ValidatedPatch, ValidatedRow,
};
use sqlx::{PgConnection, PgPool};
use url::Url;

use super::{
    CatalogRepository, IngestOutcome, RepositoryError, quantity_from_db, quantity_to_db,
};

const PRODUCT_COLUMNS: &str =
    "id, store_id, name, unit_price, description, quantity, image_url";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    store_id: i32,
    name: String,
    unit_price: Decimal,
    description: Option<String>,
    quantity: i32,
    image_url: Option<String>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let unit_price = UnitPrice::new(row.unit_price).map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;
        let image_url = row
            .image_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("product {} image url: {e}", row.id))
            })?;

        Ok(Self {
            id: ProductId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            unit_price,
            description: row.description,
            quantity: quantity_from_db(row.quantity, "product")?,
            image_url,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    source_name: String,
    last_updated: DateTime<Utc>,
}

/// Catalog repository backed by the `products` and `inventory_snapshots`
/// tables.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn list_in(
    conn: &mut PgConnection,
    store_id: StoreId,
) -> Result<Vec<Product>, RepositoryError> {
    let rows: Vec<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = $1 ORDER BY id"
    ))
    .bind(store_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(Product::try_from).collect()
}

async fn insert_row(
    conn: &mut PgConnection,
    store_id: StoreId,
    row: &ValidatedRow,
) -> Result<Product, RepositoryError> {
    let inserted: ProductRow = sqlx::query_as(&format!(
        r"
        INSERT INTO products (store_id, name, unit_price, description, quantity, image_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {PRODUCT_COLUMNS}
        "
    ))
    .bind(store_id)
    .bind(&row.name)
    .bind(row.unit_price.amount())
    .bind(row.description.as_deref())
    .bind(quantity_to_db(row.quantity)?)
    .bind(row.image_url.as_ref().map(Url::as_str))
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::from_write(e, &format!("product named {:?}", row.name)))?;

    inserted.try_into()
}

async fn record_snapshot(
    conn: &mut PgConnection,
    store_id: StoreId,
    snapshot: &InventorySnapshot,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO inventory_snapshots (store_id, source_name, last_updated)
        VALUES ($1, $2, $3)
        ON CONFLICT (store_id) DO UPDATE
        SET source_name = EXCLUDED.source_name, last_updated = EXCLUDED.last_updated
        ",
    )
    .bind(store_id)
    .bind(&snapshot.source_name)
    .bind(snapshot.last_updated)
    .execute(conn)
    .await?;

    Ok(())
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        list_in(&mut *conn, store_id).await
    }

    async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = $1 AND id = $2"
        ))
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn create_product(
        &self,
        store_id: StoreId,
        row: &ValidatedRow,
    ) -> Result<Product, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_row(&mut *conn, store_id, row).await
    }

    async fn update_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        patch: &ValidatedPatch,
    ) -> Result<Product, RepositoryError> {
        let quantity = patch.quantity.map(quantity_to_db).transpose()?;
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE products SET
                name = COALESCE($3, name),
                unit_price = COALESCE($4, unit_price),
                description = COALESCE($5, description),
                quantity = COALESCE($6, quantity),
                image_url = COALESCE($7, image_url),
                updated_at = NOW()
            WHERE store_id = $1 AND id = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(product_id)
        .bind(patch.name.as_deref())
        .bind(patch.unit_price.map(|p| p.amount()))
        .bind(patch.description.as_deref())
        .bind(quantity)
        .bind(patch.image_url.as_ref().map(Url::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product with this name"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn delete_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE store_id = $1 AND id = $2")
            .bind(store_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn replace_catalog(
        &self,
        store_id: StoreId,
        rows: &[ValidatedRow],
        snapshot: &InventorySnapshot,
    ) -> Result<IngestOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM products WHERE store_id = $1")
            .bind(store_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for row in rows {
            insert_row(&mut *tx, store_id, row).await?;
        }
        record_snapshot(&mut *tx, store_id, snapshot).await?;
        let products = list_in(&mut *tx, store_id).await?;

        tx.commit().await?;

        Ok(IngestOutcome {
            inserted: rows.len(),
            updated: 0,
            removed: usize::try_from(removed).unwrap_or(usize::MAX),
            products,
        })
    }

    async fn merge_catalog(
        &self,
        store_id: StoreId,
        rows: &[ValidatedRow],
        snapshot: &InventorySnapshot,
    ) -> Result<IngestOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        let mut updated = 0;

        for row in rows {
            let matched: Option<(i32,)> = sqlx::query_as(
                r"
                UPDATE products SET
                    unit_price = $3,
                    description = $4,
                    quantity = $5,
                    updated_at = NOW()
                WHERE store_id = $1 AND name = $2
                RETURNING id
                ",
            )
            .bind(store_id)
            .bind(&row.name)
            .bind(row.unit_price.amount())
            .bind(row.description.as_deref())
            .bind(quantity_to_db(row.quantity)?)
            .fetch_optional(&mut *tx)
            .await?;

            if matched.is_some() {
                updated += 1;
            } else {
                insert_row(&mut *tx, store_id, row).await?;
                inserted += 1;
            }
        }
        record_snapshot(&mut *tx, store_id, snapshot).await?;
        let products = list_in(&mut *tx, store_id).await?;

        tx.commit().await?;

        Ok(IngestOutcome {
            inserted,
            updated,
            removed: 0,
            products,
        })
    }

    async fn latest_snapshot(
        &self,
        store_id: StoreId,
    ) -> Result<Option<InventorySnapshot>, RepositoryError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT source_name, last_updated FROM inventory_snapshots WHERE store_id = $1",
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| InventorySnapshot {
            source_name: r.source_name,
            last_updated: r.last_updated,
        }))
    }
}

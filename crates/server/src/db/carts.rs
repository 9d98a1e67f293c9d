//! `PostgreSQL` cart repository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shopfront_core::{
    Cart, CartItemId, CartLine, CustomerId, LineWrite, ProductId, StoreId, UnitPrice,
};
use sqlx::{PgConnection, PgPool};
use url::Url;

use super::{
    CartRepository, CartWriteError, RepositoryError, quantity_from_db, quantity_to_db,
};

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    product_id: i32,
    quantity: i32,
    name: String,
    unit_price: Decimal,
    image_url: Option<String>,
    stock_at_read: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let unit_price = UnitPrice::new(row.unit_price)
            .map_err(|e| RepositoryError::DataCorruption(format!("cart item {}: {e}", row.id)))?;
        let image_url = row
            .image_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("cart item {} image url: {e}", row.id))
            })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            cart_item_id: Some(CartItemId::new(row.id)),
            quantity: quantity_from_db(row.quantity, "cart item")?,
            name: row.name,
            unit_price,
            image_url,
            stock_at_read: quantity_from_db(row.stock_at_read, "product")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    name: String,
    unit_price: Decimal,
    image_url: Option<String>,
    quantity: i32,
}

/// Cart repository backed by the `cart_items` table.
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn read_cart(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    store_id: StoreId,
) -> Result<Cart, RepositoryError> {
    // Lines outlive deleted products; those read as out of stock.
    let rows: Vec<CartLineRow> = sqlx::query_as(
        r"
        SELECT ci.id, ci.product_id, ci.quantity, ci.name, ci.unit_price, ci.image_url,
               COALESCE(p.quantity, 0) AS stock_at_read
        FROM cart_items ci
        LEFT JOIN products p ON p.id = ci.product_id AND p.store_id = ci.store_id
        WHERE ci.customer_id = $1 AND ci.store_id = $2
        ORDER BY ci.id
        ",
    )
    .bind(customer_id)
    .bind(store_id)
    .fetch_all(conn)
    .await?;

    let lines = rows
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cart::from_lines(lines))
}

async fn delete_line(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    store_id: StoreId,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "DELETE FROM cart_items WHERE customer_id = $1 AND store_id = $2 AND product_id = $3",
    )
    .bind(customer_id)
    .bind(store_id)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn cart(
        &self,
        customer_id: CustomerId,
        store_id: StoreId,
    ) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        read_cart(&mut *conn, customer_id, store_id).await
    }

    async fn write_item(
        &self,
        customer_id: CustomerId,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, CartWriteError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        if write == LineWrite::Set(0) {
            delete_line(&mut *tx, customer_id, store_id, product_id).await?;
            let cart = read_cart(&mut *tx, customer_id, store_id).await?;
            tx.commit().await.map_err(RepositoryError::from)?;
            return Ok(cart);
        }

        // Hold the product row so an ingest cannot lower stock mid-write.
        let product: StockRow = sqlx::query_as(
            r"
            SELECT name, unit_price, image_url, quantity
            FROM products
            WHERE store_id = $1 AND id = $2
            FOR SHARE
            ",
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::from)?
        .ok_or(CartWriteError::ProductNotFound(product_id))?;

        let current: Option<(i32,)> = sqlx::query_as(
            r"
            SELECT quantity FROM cart_items
            WHERE customer_id = $1 AND store_id = $2 AND product_id = $3
            FOR UPDATE
            ",
        )
        .bind(customer_id)
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let current = current
            .map(|(quantity,)| quantity_from_db(quantity, "cart item"))
            .transpose()?
            .unwrap_or(0);
        let available = quantity_from_db(product.quantity, "product")?;
        let quantity = write.resulting_quantity(current);

        if quantity > available {
            return Err(CartWriteError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            });
        }

        if quantity == 0 {
            delete_line(&mut *tx, customer_id, store_id, product_id).await?;
        } else {
            // Adds stay additive even if a concurrent merge inserted the line
            // after the read above.
            let (assignment, amount) = match write {
                LineWrite::Add(amount) => ("cart_items.quantity + EXCLUDED.quantity", amount),
                LineWrite::Set(_) => ("EXCLUDED.quantity", quantity),
            };
            sqlx::query(&format!(
                r"
                INSERT INTO cart_items
                    (customer_id, store_id, product_id, quantity, name, unit_price, image_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (customer_id, store_id, product_id) DO UPDATE
                SET quantity = {assignment},
                    name = EXCLUDED.name,
                    unit_price = EXCLUDED.unit_price,
                    image_url = EXCLUDED.image_url,
                    updated_at = NOW()
                "
            ))
            .bind(customer_id)
            .bind(store_id)
            .bind(product_id)
            .bind(quantity_to_db(amount)?)
            .bind(&product.name)
            .bind(product.unit_price)
            .bind(product.image_url.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        }

        let cart = read_cart(&mut *tx, customer_id, store_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(cart)
    }
}

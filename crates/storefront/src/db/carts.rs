//! `PostgreSQL` cart queries.
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow`) so the
//! crate builds without a live database.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{debug, instrument};
use uuid::Uuid;

use shopfront_core::{
    CartItem, CurrencyCode, LineKey, Price, ProductId, RemoteLineId, VariantSelection,
};

use super::RepositoryError;

/// A `storefront.cart_item` row.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    line_key: Uuid,
    product_id: i32,
    variant_selection: Json<VariantSelection>,
    unit_price: Decimal,
    currency_code: String,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let currency_code = row.currency_code.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("cart_item {}: {e}", row.id))
        })?;
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "cart_item {}: invalid quantity {}",
                    row.id, row.quantity
                ))
            })?;

        Ok(Self {
            line_key: LineKey::new(row.line_key),
            remote_id: Some(RemoteLineId::new(row.id)),
            product_id: ProductId::new(row.product_id),
            variant_selection: row.variant_selection.0,
            unit_price: Price::new(row.unit_price, currency_code),
            quantity,
            added_at: row.added_at,
        })
    }
}

/// Cart tables in the `storefront` schema.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get every row of the cart with `identity_key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be converted.
    #[instrument(skip(self))]
    pub async fn fetch(&self, identity_key: &str) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT ci.id, ci.line_key, ci.product_id, ci.variant_selection,
                   ci.unit_price, ci.currency_code, ci.quantity, ci.added_at
            FROM storefront.cart_item ci
            JOIN storefront.cart c ON c.id = ci.cart_id
            WHERE c.identity_key = $1
            ORDER BY ci.added_at, ci.id
            ",
        )
        .bind(identity_key)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(CartItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(rows = items.len(), "Fetched cart rows");
        Ok(items)
    }

    /// Insert a line, or overwrite the quantity of the existing line with the same key.
    ///
    /// The cart row is created on the first line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the quantity does not fit the column.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, line), fields(line_key = %line.line_key))]
    pub async fn upsert_line(
        &self,
        identity_key: &str,
        line: &CartItem,
    ) -> Result<CartItem, RepositoryError> {
        let quantity = i32::try_from(line.quantity).map_err(|_| {
            RepositoryError::Conflict(format!("quantity {} out of range", line.quantity))
        })?;

        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            WITH cart AS (
                INSERT INTO storefront.cart (identity_key)
                VALUES ($1)
                ON CONFLICT (identity_key) DO UPDATE SET updated_at = NOW()
                RETURNING id
            )
            INSERT INTO storefront.cart_item (
                cart_id, line_key, product_id, variant_selection,
                unit_price, currency_code, quantity, added_at
            )
            SELECT cart.id, $2, $3, $4, $5, $6, $7, $8 FROM cart
            ON CONFLICT (cart_id, line_key) DO UPDATE
                SET quantity = EXCLUDED.quantity, updated_at = NOW()
            RETURNING id, line_key, product_id, variant_selection,
                      unit_price, currency_code, quantity, added_at
            ",
        )
        .bind(identity_key)
        .bind(line.line_key.as_uuid())
        .bind(line.product_id.as_i32())
        .bind(Json(&line.variant_selection))
        .bind(line.unit_price.amount)
        .bind(line.unit_price.currency_code.as_str())
        .bind(quantity)
        .bind(line.added_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_check_violation()
            {
                return RepositoryError::Conflict("line violates cart_item constraints".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        CartItem::try_from(row)
    }

    /// Delete one line. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn delete_line(
        &self,
        identity_key: &str,
        line_key: LineKey,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item ci
            USING storefront.cart c
            WHERE ci.cart_id = c.id
              AND c.identity_key = $1
              AND ci.line_key = $2
            ",
        )
        .bind(identity_key)
        .bind(line_key.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the cart and its lines. Returns the number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, identity_key: &str) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            r"
            DELETE FROM storefront.cart_item ci
            USING storefront.cart c
            WHERE ci.cart_id = c.id AND c.identity_key = $1
            ",
        )
        .bind(identity_key)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM storefront.cart WHERE identity_key = $1")
            .bind(identity_key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }

    /// Run a trivial query to check connectivity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

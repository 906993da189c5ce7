//! Account cart repository.
//!
//! Each account's cart of record is stored as ordered rows in
//! `storefront.cart_line`. Writes replace the whole cart inside one
//! transaction holding the account row lock, so a failed write leaves the
//! previous cart intact and concurrent writes apply one after the other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use cartline_core::{
    CartLine, CartLineId, CurrencyCode, IdentityCartStore, Price, ProductId, StoreError, UserId,
};

use super::{RepositoryError, conflict_on_unique};

/// Repository for account carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load an account's cart lines in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn load_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, product_id, variant_label, unit_price, currency_code,
                   quantity, last_modified
            FROM storefront.cart_line
            WHERE user_id = $1
            ORDER BY position ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(CartLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = lines.len(), "Loaded account cart");
        Ok(lines)
    }

    /// Replace an account's cart lines atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if two lines share a product and
    /// variant, `RepositoryError::DataCorruption` if a quantity does not fit
    /// the column, and `RepositoryError::Database` for other failures. In
    /// every error case the previous cart is left in place.
    #[instrument(skip(self, lines), fields(user_id = %user_id, count = lines.len()))]
    pub async fn replace_lines(
        &self,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialize writers for one account so the last replace wins whole.
        sqlx::query("SELECT id FROM storefront.user WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for (position, line) in lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::DataCorruption("cart has too many lines".to_owned()))?;
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity {} out of range", line.quantity))
            })?;

            sqlx::query(
                r"
                INSERT INTO storefront.cart_line
                    (id, user_id, position, product_id, variant_label,
                     unit_price, currency_code, quantity, last_modified)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(line.id)
            .bind(user_id)
            .bind(position)
            .bind(line.product_id)
            .bind(line.variant_label.as_deref())
            .bind(line.unit_price.amount)
            .bind(line.unit_price.currency_code.code())
            .bind(quantity)
            .bind(line.last_modified)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "duplicate cart line"))?;
        }

        tx.commit().await?;

        debug!("Replaced account cart");
        Ok(())
    }
}

#[async_trait]
impl IdentityCartStore for CartRepository {
    async fn load(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
        self.load_lines(user).await.map_err(StoreError::from)
    }

    async fn replace(&self, user: UserId, lines: &[CartLine]) -> Result<(), StoreError> {
        self.replace_lines(user, lines).await.map_err(StoreError::from)
    }
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => Self::Unavailable(e.to_string()),
            RepositoryError::DataCorruption(msg) => Self::Corrupt(msg),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

/// Internal row type for `storefront.cart_line`.
#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    product_id: Option<i32>,
    variant_label: Option<String>,
    unit_price: Decimal,
    currency_code: String,
    quantity: i32,
    last_modified: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::from_code(&row.currency_code).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("unknown currency: {}", row.currency_code))
        })?;
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!("invalid quantity: {}", row.quantity))
            })?;

        Ok(Self {
            id: CartLineId::new(row.id),
            product_id: row.product_id.map(ProductId::new),
            variant_label: row.variant_label,
            unit_price: Price::new(row.unit_price, currency),
            quantity,
            last_modified: row.last_modified,
        })
    }
}

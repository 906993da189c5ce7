//! Storage seams for guest and account carts.
//!
//! Stores are explicit objects handed to [`crate::sync::synchronize`]; the
//! storefront provides session- and Postgres-backed implementations, and
//! [`MemoryCartStore`] backs tests and local development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CartLine, UserId};

/// Errors reported by cart stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached or failed the operation.
    #[error("cart store unavailable: {0}")]
    Unavailable(String),

    /// A concurrent writer got in first.
    #[error("cart write conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded.
    #[error("corrupt cart data: {0}")]
    Corrupt(String),
}

/// The cart held by a browsing session before sign-in.
#[async_trait]
pub trait AnonymousCartStore: Send + Sync {
    /// Load the guest lines.
    async fn load(&self) -> Result<Vec<CartLine>, StoreError>;

    /// Replace the guest lines.
    async fn save(&self, lines: &[CartLine]) -> Result<(), StoreError>;

    /// Drop the guest cart.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// The persisted cart of record for signed-in accounts.
#[async_trait]
pub trait IdentityCartStore: Send + Sync {
    /// Load an account's lines. An account with no cart yields an empty list.
    async fn load(&self, user: UserId) -> Result<Vec<CartLine>, StoreError>;

    /// Atomically replace an account's lines.
    ///
    /// On error nothing has been written.
    async fn replace(&self, user: UserId, lines: &[CartLine]) -> Result<(), StoreError>;
}

/// In-memory store implementing both cart seams.
///
/// One instance holds a single guest cart plus any number of account carts.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    guest: Vec<CartLine>,
    accounts: HashMap<UserId, Vec<CartLine>>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with a guest cart.
    #[must_use]
    pub fn with_guest(lines: Vec<CartLine>) -> Self {
        let store = Self::new();
        store.lock().guest = lines;
        store
    }

    /// Snapshot of the guest lines.
    #[must_use]
    pub fn guest_lines(&self) -> Vec<CartLine> {
        self.lock().guest.clone()
    }

    /// Snapshot of an account's lines.
    #[must_use]
    pub fn account_lines(&self, user: UserId) -> Vec<CartLine> {
        self.lock().accounts.get(&user).cloned().unwrap_or_default()
    }

    /// Seed an account cart directly.
    pub fn put_account(&self, user: UserId, lines: Vec<CartLine>) {
        self.lock().accounts.insert(user, lines);
    }

    // A panic while holding the lock cannot leave a half-written cart behind.
    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AnonymousCartStore for MemoryCartStore {
    async fn load(&self) -> Result<Vec<CartLine>, StoreError> {
        Ok(self.guest_lines())
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), StoreError> {
        self.lock().guest = lines.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lock().guest.clear();
        Ok(())
    }
}

#[async_trait]
impl IdentityCartStore for MemoryCartStore {
    async fn load(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
        Ok(self.account_lines(user))
    }

    async fn replace(&self, user: UserId, lines: &[CartLine]) -> Result<(), StoreError> {
        self.lock().accounts.insert(user, lines.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::{CurrencyCode, Price};

    fn line(quantity: u32) -> CartLine {
        CartLine::new(
            None,
            Some("Gift card".to_string()),
            Price::new(Decimal::TEN, CurrencyCode::USD),
            quantity,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_guest_round_trip_and_clear() {
        let store = MemoryCartStore::new();
        AnonymousCartStore::save(&store, &[line(2)]).await.unwrap();
        assert_eq!(AnonymousCartStore::load(&store).await.unwrap().len(), 1);

        store.clear().await.unwrap();
        assert!(AnonymousCartStore::load(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let store = MemoryCartStore::new();
        store.replace(UserId::new(1), &[line(1)]).await.unwrap();

        assert_eq!(IdentityCartStore::load(&store, UserId::new(1)).await.unwrap().len(), 1);
        assert!(IdentityCartStore::load(&store, UserId::new(2)).await.unwrap().is_empty());
    }
}

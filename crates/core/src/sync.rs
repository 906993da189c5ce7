//! Sign-in cart synchronization.
//!
//! Loads both carts, reconciles them, persists the result under the account,
//! then clears the guest cart. A failure before the account write leaves both
//! carts exactly as they were.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::reconcile::reconcile_at;
use crate::store::{AnonymousCartStore, IdentityCartStore, StoreError};
use crate::types::{CartLine, UserId};

/// Why a sign-in sync did not complete.
///
/// In both cases the guest cart is untouched and remains the cart to show.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The guest or account cart could not be loaded.
    #[error("failed to load cart: {0}")]
    StorageRead(#[source] StoreError),

    /// The merged cart could not be persisted.
    #[error("failed to persist merged cart: {0}")]
    StorageWrite(#[source] StoreError),
}

/// Result of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The account's cart of record after the sync.
    pub lines: Vec<CartLine>,
    /// Whether guest lines were merged and written.
    pub merged: bool,
    /// Why the guest cart could not be cleared after a successful write.
    ///
    /// A later sync is then harmless because reconciliation never raises a
    /// quantity past the larger of the two sides.
    pub anonymous_clear_error: Option<StoreError>,
}

impl SyncOutcome {
    /// Whether the guest cart is empty after the sync.
    #[must_use]
    pub const fn anonymous_cleared(&self) -> bool {
        self.anonymous_clear_error.is_none()
    }
}

/// Fold the guest cart into an account's cart of record.
///
/// # Errors
///
/// Returns `SyncError::StorageRead` if either cart fails to load and
/// `SyncError::StorageWrite` if the merged cart cannot be persisted.
pub async fn synchronize<A, I>(
    anonymous: &A,
    identity: &I,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, SyncError>
where
    A: AnonymousCartStore + ?Sized,
    I: IdentityCartStore + ?Sized,
{
    let local = anonymous.load().await.map_err(SyncError::StorageRead)?;
    let remote = identity.load(user).await.map_err(SyncError::StorageRead)?;

    if local.is_empty() {
        return Ok(SyncOutcome {
            lines: remote,
            merged: false,
            anonymous_clear_error: None,
        });
    }

    let merged = reconcile_at(local, remote, now);
    identity
        .replace(user, &merged)
        .await
        .map_err(SyncError::StorageWrite)?;

    let anonymous_clear_error = anonymous.clear().await.err();

    Ok(SyncOutcome {
        lines: merged,
        merged: true,
        anonymous_clear_error,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::MemoryCartStore;
    use crate::types::{CurrencyCode, Price, ProductId};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn line(product: i32, quantity: u32, modified: i64) -> CartLine {
        CartLine::new(
            Some(ProductId::new(product)),
            None,
            Price::new(Decimal::new(1200, 2), CurrencyCode::USD),
            quantity,
            at(modified),
        )
        .unwrap()
    }

    const USER: UserId = UserId::new(9);

    /// Account store whose reads or writes can be made to fail.
    #[derive(Default)]
    struct FlakyAccounts {
        inner: MemoryCartStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl IdentityCartStore for FlakyAccounts {
        async fn load(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("read timeout".to_string()));
            }
            IdentityCartStore::load(&self.inner, user).await
        }

        async fn replace(&self, user: UserId, lines: &[CartLine]) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Conflict("serialization failure".to_string()));
            }
            self.inner.replace(user, lines).await
        }
    }

    /// Guest store whose `clear` always fails.
    struct StuckGuest(MemoryCartStore);

    #[async_trait]
    impl AnonymousCartStore for StuckGuest {
        async fn load(&self) -> Result<Vec<CartLine>, StoreError> {
            AnonymousCartStore::load(&self.0).await
        }

        async fn save(&self, lines: &[CartLine]) -> Result<(), StoreError> {
            self.0.save(lines).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("session store down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_merges_persists_and_clears_guest() {
        let guest = MemoryCartStore::with_guest(vec![line(1, 2, 10), line(2, 1, 10)]);
        let accounts = MemoryCartStore::new();
        accounts.put_account(USER, vec![line(1, 3, 20)]);

        let outcome = synchronize(&guest, &accounts, USER, at(100)).await.unwrap();

        assert!(outcome.merged);
        assert!(outcome.anonymous_cleared());
        assert_eq!(outcome.lines.len(), 2);
        assert_eq!(accounts.account_lines(USER), outcome.lines);
        assert!(guest.guest_lines().is_empty());
    }

    #[tokio::test]
    async fn test_empty_guest_skips_write() {
        let guest = MemoryCartStore::new();
        let accounts = FlakyAccounts::default();
        accounts.inner.put_account(USER, vec![line(1, 1, 0)]);
        accounts.fail_writes.store(true, Ordering::SeqCst);

        let outcome = synchronize(&guest, &accounts, USER, at(100)).await.unwrap();

        assert!(!outcome.merged);
        assert_eq!(outcome.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_preserves_guest_cart() {
        let guest_lines = vec![line(1, 2, 10)];
        let guest = MemoryCartStore::with_guest(guest_lines.clone());
        let accounts = FlakyAccounts::default();
        accounts.fail_reads.store(true, Ordering::SeqCst);

        let err = synchronize(&guest, &accounts, USER, at(100)).await.unwrap_err();

        assert!(matches!(err, SyncError::StorageRead(StoreError::Unavailable(_))));
        assert_eq!(guest.guest_lines(), guest_lines);
    }

    #[tokio::test]
    async fn test_write_failure_preserves_both_carts() {
        let guest_lines = vec![line(1, 5, 10)];
        let account_lines = vec![line(1, 2, 5)];
        let guest = MemoryCartStore::with_guest(guest_lines.clone());
        let accounts = FlakyAccounts::default();
        accounts.inner.put_account(USER, account_lines.clone());
        accounts.fail_writes.store(true, Ordering::SeqCst);

        let err = synchronize(&guest, &accounts, USER, at(100)).await.unwrap_err();

        assert!(matches!(err, SyncError::StorageWrite(StoreError::Conflict(_))));
        assert_eq!(guest.guest_lines(), guest_lines);
        assert_eq!(accounts.inner.account_lines(USER), account_lines);
    }

    #[tokio::test]
    async fn test_retry_after_write_failure_succeeds() {
        let guest = MemoryCartStore::with_guest(vec![line(1, 5, 10)]);
        let accounts = FlakyAccounts::default();
        accounts.fail_writes.store(true, Ordering::SeqCst);
        assert!(synchronize(&guest, &accounts, USER, at(100)).await.is_err());

        accounts.fail_writes.store(false, Ordering::SeqCst);
        let outcome = synchronize(&guest, &accounts, USER, at(200)).await.unwrap();

        assert_eq!(outcome.lines[0].quantity, 5);
        assert_eq!(outcome.lines[0].last_modified, at(200));
        assert!(guest.guest_lines().is_empty());
    }

    #[tokio::test]
    async fn test_clear_failure_keeps_merge_and_reports_cause() {
        let guest = StuckGuest(MemoryCartStore::with_guest(vec![
            line(1, 2, 10),
            line(2, 1, 10),
        ]));
        let accounts = MemoryCartStore::new();
        accounts.put_account(USER, vec![line(1, 3, 20)]);

        let outcome = synchronize(&guest, &accounts, USER, at(100)).await.unwrap();

        assert!(outcome.merged);
        assert!(!outcome.anonymous_cleared());
        assert_eq!(
            outcome.anonymous_clear_error,
            Some(StoreError::Unavailable("session store down".to_string()))
        );
        assert_eq!(accounts.account_lines(USER), outcome.lines);
        assert_eq!(guest.0.guest_lines().len(), 2);

        // The leftover guest lines merge again without inflating quantities.
        let again = synchronize(&guest, &accounts, USER, at(200)).await.unwrap();
        let quantities = |lines: &[CartLine]| lines.iter().map(|l| l.quantity).collect::<Vec<_>>();
        assert_eq!(quantities(&again.lines), vec![3, 1]);
        assert_eq!(quantities(&accounts.account_lines(USER)), vec![3, 1]);
    }

    #[tokio::test]
    async fn test_leftover_guest_lines_merge_into_another_account() {
        let guest = StuckGuest(MemoryCartStore::with_guest(vec![line(1, 2, 10)]));
        let accounts = MemoryCartStore::new();
        let other = UserId::new(10);

        let first = synchronize(&guest, &accounts, USER, at(100)).await.unwrap();
        let second = synchronize(&guest, &accounts, other, at(200)).await.unwrap();

        assert!(second.merged);
        // Both accounts hold the guest line under its original id.
        assert_eq!(first.lines[0].id, second.lines[0].id);
        assert_eq!(accounts.account_lines(USER).len(), 1);
        assert_eq!(accounts.account_lines(other).len(), 1);
    }
}

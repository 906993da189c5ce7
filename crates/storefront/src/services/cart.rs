//! Cart service.
//!
//! Decides which cart a request is looking at, applies mutations to it, and
//! runs the sign-in merge of the guest cart into the account cart.
//!
//! # Active cart
//!
//! - Guests see the cart in their session.
//! - Signed-in users see their account cart of record.
//! - A signed-in user whose sign-in merge failed keeps seeing the session
//!   cart. Every request retries the merge until it succeeds.

use chrono::Utc;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use cartline_core::{
    AnonymousCartStore, Cart, CartError, CartLine, CartLineId, CartOwner, IdentityCartStore,
    Price, ProductId, UserId, synchronize,
};

use crate::config::CartConfig;
use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::services::session_cart::SessionCartStore;

/// The cart a request operates on.
#[derive(Debug, Clone)]
pub struct ActiveCart {
    /// The cart and its owner.
    pub cart: Cart,
    /// A sign-in merge failed and is still outstanding.
    pub sync_pending: bool,
}

/// Result of a sign-in merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The account cart is now the cart of record.
    Synced {
        /// Whether any guest lines were merged.
        merged: bool,
    },
    /// The merge failed; the guest cart stays visible until a retry succeeds.
    Pending,
}

/// A line to add to the active cart.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub product_id: Option<ProductId>,
    pub variant_label: Option<String>,
    pub unit_price: Price,
    pub quantity: u32,
}

/// Cart operations for one request.
pub struct CartService<'a> {
    identity: &'a dyn IdentityCartStore,
    guest: SessionCartStore,
    session: Session,
    config: CartConfig,
}

impl<'a> CartService<'a> {
    /// Create a cart service for a request's session.
    #[must_use]
    pub fn new(identity: &'a dyn IdentityCartStore, session: Session, config: CartConfig) -> Self {
        Self {
            identity,
            guest: SessionCartStore::new(session.clone()),
            session,
            config,
        }
    }

    // =========================================================================
    // Sign-in Sync
    // =========================================================================

    /// Merge the guest cart into a freshly signed-in user's account cart.
    ///
    /// A storage failure is not an error here: the user stays signed in, the
    /// guest cart stays visible, and the merge is marked pending.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the pending flag cannot be updated.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn sign_in(&self, user: &CurrentUser) -> Result<SyncStatus, AppError> {
        match self.run_sync(user.id).await {
            Ok(merged) => Ok(SyncStatus::Synced { merged }),
            Err(e) => {
                warn!(error = %e, "Cart sync failed, keeping guest cart");
                Ok(SyncStatus::Pending)
            }
        }
    }

    /// Retry a pending merge, reporting failure to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CartSync` if the merge fails again.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn retry_sync(&self, user: &CurrentUser) -> Result<ActiveCart, AppError> {
        self.run_sync(user.id).await?;
        self.active(Some(user)).await
    }

    async fn run_sync(&self, user: UserId) -> Result<bool, AppError> {
        match synchronize(&self.guest, self.identity, user, Utc::now()).await {
            Ok(outcome) => {
                if let Some(e) = &outcome.anonymous_clear_error {
                    warn!(error = %e, "Merged cart persisted but guest cart was not cleared");
                }
                info!(
                    merged = outcome.merged,
                    lines = outcome.lines.len(),
                    "Cart synced"
                );
                self.session
                    .remove::<bool>(session_keys::CART_SYNC_PENDING)
                    .await?;
                Ok(outcome.merged)
            }
            Err(e) => {
                self.session
                    .insert(session_keys::CART_SYNC_PENDING, true)
                    .await?;
                Err(AppError::CartSync(e))
            }
        }
    }

    async fn sync_pending(&self) -> Result<bool, AppError> {
        Ok(self
            .session
            .get::<bool>(session_keys::CART_SYNC_PENDING)
            .await?
            .unwrap_or(false))
    }

    // =========================================================================
    // Active Cart
    // =========================================================================

    /// Resolve the cart this request should see.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CartStore` if the cart cannot be loaded.
    pub async fn active(&self, user: Option<&CurrentUser>) -> Result<ActiveCart, AppError> {
        let Some(user) = user else {
            return self.guest_cart(false).await;
        };

        if self.sync_pending().await? && self.sign_in(user).await? == SyncStatus::Pending {
            return self.guest_cart(true).await;
        }

        let lines = self.identity.load(user.id).await?;
        Ok(ActiveCart {
            cart: Cart::from_lines(CartOwner::Identity(user.id), lines),
            sync_pending: false,
        })
    }

    async fn guest_cart(&self, sync_pending: bool) -> Result<ActiveCart, AppError> {
        let token = self.guest.owner_token().await?;
        let lines = self.guest.load().await?;
        Ok(ActiveCart {
            cart: Cart::from_lines(CartOwner::Anonymous(token), lines),
            sync_pending,
        })
    }

    async fn save(&self, active: &ActiveCart) -> Result<(), AppError> {
        match active.cart.owner() {
            CartOwner::Anonymous(_) => self.guest.save(active.cart.lines()).await?,
            CartOwner::Identity(user) => self.identity.replace(*user, active.cart.lines()).await?,
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a line to the active cart, summing into an existing line for the
    /// same product and variant.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cart` for invalid quantities or prices, a line
    /// pushed past the quantity limit, or a total too large to represent.
    /// Returns `AppError::BadRequest` for a currency other than the store's.
    #[instrument(skip(self, user))]
    pub async fn add_line(
        &self,
        user: Option<&CurrentUser>,
        new_line: NewLine,
    ) -> Result<ActiveCart, AppError> {
        if new_line.unit_price.currency_code != self.config.currency {
            return Err(AppError::BadRequest(format!(
                "prices must be in {}",
                self.config.currency.code()
            )));
        }

        let line = CartLine::new(
            new_line.product_id,
            new_line.variant_label,
            new_line.unit_price,
            new_line.quantity,
            Utc::now(),
        )?;

        let mut active = self.active(user).await?;
        let id = active.cart.add(line);
        self.check_limit(active.cart.line(id))?;
        self.check_total(&active.cart)?;

        self.save(&active).await?;
        Ok(active)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cart` if the line does not exist, the quantity is
    /// over the limit, or the cart total would be too large to represent.
    #[instrument(skip(self, user))]
    pub async fn update_line(
        &self,
        user: Option<&CurrentUser>,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<ActiveCart, AppError> {
        if quantity > self.config.max_line_quantity {
            return Err(CartError::QuantityLimit {
                max: self.config.max_line_quantity,
            }
            .into());
        }

        let mut active = self.active(user).await?;
        active.cart.set_quantity(line_id, quantity, Utc::now())?;
        self.check_total(&active.cart)?;

        self.save(&active).await?;
        Ok(active)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cart` if the line does not exist.
    #[instrument(skip(self, user))]
    pub async fn remove_line(
        &self,
        user: Option<&CurrentUser>,
        line_id: CartLineId,
    ) -> Result<ActiveCart, AppError> {
        let mut active = self.active(user).await?;
        active.cart.remove(line_id)?;

        self.save(&active).await?;
        Ok(active)
    }

    /// Empty the active cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CartStore` if the cart cannot be written.
    #[instrument(skip(self, user))]
    pub async fn clear(&self, user: Option<&CurrentUser>) -> Result<ActiveCart, AppError> {
        let mut active = self.active(user).await?;
        active.cart.clear();

        self.save(&active).await?;
        Ok(active)
    }

    fn check_limit(&self, line: Option<&CartLine>) -> Result<(), CartError> {
        let max = self.config.max_line_quantity;
        match line {
            Some(line) if line.quantity > max => Err(CartError::QuantityLimit { max }),
            _ => Ok(()),
        }
    }

    /// Reject a change whose line or cart totals cannot be priced.
    fn check_total(&self, cart: &Cart) -> Result<(), CartError> {
        cart.subtotal(self.config.currency).map(|_| ())
    }
}

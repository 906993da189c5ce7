//! Session-related types.
//!
//! Types stored in the session for authentication and guest cart state.

use serde::{Deserialize, Serialize};

use cartline_core::{Email, UserId};

use super::user::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart lines.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the opaque token identifying the guest cart's owner.
    pub const GUEST_TOKEN: &str = "guest_token";

    /// Set while a sign-in cart merge has failed and must be retried.
    pub const CART_SYNC_PENDING: &str = "cart_sync_pending";
}

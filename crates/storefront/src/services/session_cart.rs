//! Guest cart stored in the browsing session.

use async_trait::async_trait;
use tower_sessions::Session;
use uuid::Uuid;

use cartline_core::{AnonymousCartStore, CartLine, StoreError};

use crate::models::session_keys;

/// Guest cart backed by the request's tower-sessions session.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    /// Wrap a session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Opaque token naming this guest cart's owner.
    ///
    /// Created on first use and kept for the life of the session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the session cannot be read or written.
    pub async fn owner_token(&self) -> Result<String, StoreError> {
        if let Some(token) = self
            .session
            .get::<String>(session_keys::GUEST_TOKEN)
            .await
            .map_err(unavailable)?
        {
            return Ok(token);
        }

        let token = Uuid::new_v4().to_string();
        self.session
            .insert(session_keys::GUEST_TOKEN, &token)
            .await
            .map_err(unavailable)?;
        Ok(token)
    }
}

#[async_trait]
impl AnonymousCartStore for SessionCartStore {
    async fn load(&self) -> Result<Vec<CartLine>, StoreError> {
        Ok(self
            .session
            .get::<Vec<CartLine>>(session_keys::GUEST_CART)
            .await
            .map_err(unavailable)?
            .unwrap_or_default())
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), StoreError> {
        if lines.is_empty() {
            return self.clear().await;
        }
        self.session
            .insert(session_keys::GUEST_CART, lines)
            .await
            .map_err(unavailable)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.session
            .remove::<Vec<CartLine>>(session_keys::GUEST_CART)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }
}

fn unavailable(err: tower_sessions::session::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

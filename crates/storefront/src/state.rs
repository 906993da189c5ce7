//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use cartline_core::IdentityCartStore;

use crate::config::StorefrontConfig;
use crate::db::CartRepository;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    carts: Arc<dyn IdentityCartStore>,
}

impl AppState {
    /// Create application state backed by the `PostgreSQL` cart repository.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let carts = Arc::new(CartRepository::new(pool.clone()));
        Self::with_cart_store(config, pool, carts)
    }

    /// Create application state with a specific account cart store.
    #[must_use]
    pub fn with_cart_store(
        config: StorefrontConfig,
        pool: PgPool,
        carts: Arc<dyn IdentityCartStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                carts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The account cart store.
    #[must_use]
    pub fn carts(&self) -> &dyn IdentityCartStore {
        self.inner.carts.as_ref()
    }
}

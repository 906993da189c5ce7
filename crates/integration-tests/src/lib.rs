//! Integration tests for Cartline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartline-integration-tests
//! ```
//!
//! None of these tests need a database: account carts use
//! [`MemoryCartStore`] and sessions use the in-memory session store.
//!
//! # Test Categories
//!
//! - `cart_sync` - Sign-in merges driven through the core store traits
//! - `reconcile_properties` - Merge guarantees over enumerated carts
//! - `storefront_cart` - The cart API and sign-in merge through the storefront

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::{MemoryStore, Session};

use cartline_core::{CartLine, CurrencyCode, MemoryCartStore, Price, ProductId};
use cartline_storefront::config::{CartConfig, StorefrontConfig};
use cartline_storefront::middleware::session_layer;
use cartline_storefront::routes::routes;
use cartline_storefront::state::AppState;

/// A fixed instant `secs` seconds after the epoch.
///
/// # Panics
///
/// Panics if `secs` is out of range.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// A USD line for `product` priced at 10.00.
///
/// # Panics
///
/// Panics if `quantity` is zero.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn line(product: i32, variant: Option<&str>, quantity: u32, modified: i64) -> CartLine {
    CartLine::new(
        Some(ProductId::new(product)),
        variant.map(str::to_owned),
        Price::new(Decimal::new(1000, 2), CurrencyCode::USD),
        quantity,
        at(modified),
    )
    .unwrap()
}

/// A fresh browsing session backed by `store`.
#[must_use]
pub fn session(store: &MemoryStore) -> Session {
    Session::new(None, Arc::new(store.clone()), None)
}

/// Storefront configuration that needs no environment.
#[must_use]
pub fn config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/cartline_test".to_owned()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("Qm7vT2xR9kLp4Wn8Zc3Hb6Yf1Dj5Gs0A".to_owned()),
        cart: CartConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The storefront router over in-memory sessions and account carts.
///
/// Must be called inside a Tokio runtime. The database pool never connects.
///
/// # Panics
///
/// Panics if the lazy pool URL is rejected.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn storefront(accounts: Arc<MemoryCartStore>, sessions: MemoryStore) -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/cartline_test")
        .unwrap();
    let state = AppState::with_cart_store(config(), pool, accounts);

    routes()
        .layer(session_layer(sessions, false))
        .with_state(state)
}

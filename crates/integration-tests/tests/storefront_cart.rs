//! Integration tests for the storefront cart API.
//!
//! Requests go through the full router and session layer. Sign-in is done by
//! writing the signed-in user into the shared session store, then running the
//! same merge the login handler runs.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session, session::Id};

use cartline_core::{Email, MemoryCartStore, UserId};
use cartline_integration_tests::{line, storefront};
use cartline_storefront::config::CartConfig;
use cartline_storefront::middleware::set_current_user;
use cartline_storefront::models::CurrentUser;
use cartline_storefront::services::{CartService, SyncStatus};

const SHOPPER: UserId = UserId::new(42);

/// A browser: the router plus whatever session cookie it was last given.
struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    async fn request(
        &mut self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn session_id(&self) -> Id {
        let cookie = self.cookie.as_deref().unwrap();
        let (_, value) = cookie.split_once('=').unwrap();
        value.parse().unwrap()
    }
}

fn shopper() -> CurrentUser {
    CurrentUser {
        id: SHOPPER,
        email: Email::parse("shopper@example.com").unwrap(),
    }
}

/// Sign the browser's session in and merge its guest cart.
async fn sign_in(
    browser: &Browser,
    sessions: &MemoryStore,
    accounts: &MemoryCartStore,
) -> SyncStatus {
    let session = Session::new(Some(browser.session_id()), Arc::new(sessions.clone()), None);
    set_current_user(&session, &shopper()).await.unwrap();

    let status = CartService::new(accounts, session.clone(), CartConfig::default())
        .sign_in(&shopper())
        .await
        .unwrap();
    session.save().await.unwrap();
    status
}

#[tokio::test]
async fn test_guest_cart_becomes_account_cart_after_sign_in() {
    let sessions = MemoryStore::default();
    let accounts = Arc::new(MemoryCartStore::new());
    accounts.put_account(SHOPPER, vec![line(1, None, 1, 5)]);
    let mut browser = Browser::new(storefront(accounts.clone(), sessions.clone()));

    let (status, _) = browser
        .request(
            "POST",
            "/cart/add",
            Some(json!({ "product_id": 1, "unit_price": "10.00", "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    browser
        .request(
            "POST",
            "/cart/add",
            Some(json!({ "product_id": 2, "variant_label": "Box of 6", "unit_price": "10.00" })),
        )
        .await;

    assert_eq!(
        sign_in(&browser, &sessions, &accounts).await,
        SyncStatus::Synced { merged: true }
    );

    let (status, cart) = browser.request("GET", "/cart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["owner"], "account");
    assert_eq!(cart["sync_pending"], false);
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2);
    assert_eq!(cart["lines"][0]["quantity"], 3);
    assert_eq!(cart["lines"][1]["variant_label"], "Box of 6");
    assert_eq!(cart["subtotal"], "$40.00");

    assert_eq!(accounts.account_lines(SHOPPER).len(), 2);
}

#[tokio::test]
async fn test_signed_in_edits_go_to_account_cart() {
    let sessions = MemoryStore::default();
    let accounts = Arc::new(MemoryCartStore::new());
    let mut browser = Browser::new(storefront(accounts.clone(), sessions.clone()));

    // Any session write issues the cookie.
    browser.request("GET", "/cart", None).await;
    assert_eq!(
        sign_in(&browser, &sessions, &accounts).await,
        SyncStatus::Synced { merged: false }
    );

    let (status, cart) = browser
        .request(
            "POST",
            "/cart/add",
            Some(json!({ "product_id": 4, "unit_price": "2.50", "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["owner"], "account");

    let account = accounts.account_lines(SHOPPER);
    assert_eq!(account.len(), 1);
    assert_eq!(account[0].quantity, 2);

    let (status, _) = browser.request("POST", "/cart/sync", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_quantity_limit_rejects_without_saving() {
    let sessions = MemoryStore::default();
    let accounts = Arc::new(MemoryCartStore::new());
    let mut browser = Browser::new(storefront(accounts, sessions));

    let (status, body) = browser
        .request(
            "POST",
            "/cart/add",
            Some(json!({ "product_id": 1, "unit_price": "1.00", "quantity": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("99"));

    let (_, cart) = browser.request("GET", "/cart", None).await;
    assert_eq!(cart["item_count"], 0);
}

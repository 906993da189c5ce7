//! Cart route handlers.
//!
//! Every handler resolves the active cart through [`CartService`] and answers
//! with the full cart as JSON, so clients never have to merge partial updates.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use cartline_core::{CartError, CartLine, CartLineId, CartOwner, CurrencyCode, Price, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::services::{ActiveCart, CartService, NewLine};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One cart line as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineView {
    pub id: CartLineId,
    pub product_id: Option<ProductId>,
    pub variant_label: Option<String>,
    pub unit_price: Decimal,
    pub currency: CurrencyCode,
    pub quantity: u32,
    pub line_total: String,
    pub last_modified: DateTime<Utc>,
}

impl TryFrom<&CartLine> for CartLineView {
    type Error = CartError;

    fn try_from(line: &CartLine) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: line.id,
            product_id: line.product_id,
            variant_label: line.variant_label.clone(),
            unit_price: line.unit_price.amount,
            currency: line.unit_price.currency_code,
            quantity: line.quantity,
            line_total: line.line_total()?.to_string(),
            last_modified: line.last_modified,
        })
    }
}

/// The active cart as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    /// `guest` or `account`.
    pub owner: String,
    pub lines: Vec<CartLineView>,
    pub item_count: u64,
    pub subtotal: String,
    /// A sign-in merge is outstanding; the guest cart is being shown.
    pub sync_pending: bool,
}

impl CartView {
    fn build(active: &ActiveCart, currency: CurrencyCode) -> Result<Self> {
        let owner = match active.cart.owner() {
            CartOwner::Anonymous(_) => "guest",
            CartOwner::Identity(_) => "account",
        };

        let lines = active
            .cart
            .lines()
            .iter()
            .map(CartLineView::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            owner: owner.to_string(),
            lines,
            item_count: active.cart.item_count(),
            subtotal: active.cart.subtotal(currency)?.to_string(),
            sync_pending: active.sync_pending,
        })
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: Option<ProductId>,
    pub variant_label: Option<String>,
    pub unit_price: Decimal,
    pub currency: Option<CurrencyCode>,
    pub quantity: Option<u32>,
}

/// Update-quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub line_id: CartLineId,
    pub quantity: u32,
}

/// Remove-line request body.
#[derive(Debug, Deserialize)]
pub struct RemoveLineRequest {
    pub line_id: CartLineId,
}

/// Trim a variant label; blank labels mean "no variant".
fn normalize_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

fn service<'a>(state: &'a AppState, session: Session) -> CartService<'a> {
    CartService::new(state.carts(), session, state.config().cart)
}

fn respond(state: &AppState, active: &ActiveCart) -> Result<Json<CartView>> {
    CartView::build(active, state.config().cart.currency).map(Json)
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the active cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let active = service(&state, session).active(user.as_ref()).await?;
    respond(&state, &active)
}

/// Add a line, or add to the quantity of a matching line.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<AddLineRequest>,
) -> Result<Json<CartView>> {
    let currency = request.currency.unwrap_or(state.config().cart.currency);
    let new_line = NewLine {
        product_id: request.product_id,
        variant_label: normalize_label(request.variant_label),
        unit_price: Price::new(request.unit_price, currency),
        quantity: request.quantity.unwrap_or(1),
    };

    let product = new_line
        .product_id
        .map_or_else(|| "none".to_string(), |id| id.to_string());
    add_breadcrumb("cart", "Added line", Some(&[("product_id", product.as_str())]));

    let active = service(&state, session)
        .add_line(user.as_ref(), new_line)
        .await?;
    respond(&state, &active)
}

/// Set a line's quantity. Zero removes it.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<UpdateLineRequest>,
) -> Result<Json<CartView>> {
    let active = service(&state, session)
        .update_line(user.as_ref(), request.line_id, request.quantity)
        .await?;
    respond(&state, &active)
}

/// Remove a line.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<RemoveLineRequest>,
) -> Result<Json<CartView>> {
    let active = service(&state, session)
        .remove_line(user.as_ref(), request.line_id)
        .await?;
    respond(&state, &active)
}

/// Empty the active cart.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let active = service(&state, session).clear(user.as_ref()).await?;
    respond(&state, &active)
}

/// Retry a pending sign-in merge.
///
/// Answers 503 if the merge fails again; the guest cart is kept either way.
#[instrument(skip(state, session, user))]
pub async fn sync(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let active = service(&state, session).retry_sync(&user).await?;
    respond(&state, &active)
}

//! Authentication route handlers.
//!
//! Signing in merges the session's guest cart into the account cart. A merge
//! that fails does not fail the sign-in; the response reports it as pending.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use cartline_core::{Email, UserId};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::{AuthService, CartService, SyncStatus};
use crate::state::AppState;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Outcome of the sign-in cart merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartSyncView {
    /// Guest lines were merged into the account cart.
    Merged,
    /// There was nothing to merge.
    Unchanged,
    /// The merge failed and will be retried.
    Pending,
}

impl From<SyncStatus> for CartSyncView {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Synced { merged: true } => Self::Merged,
            SyncStatus::Synced { merged: false } => Self::Unchanged,
            SyncStatus::Pending => Self::Pending,
        }
    }
}

/// Login response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub email: Email,
    pub cart_sync: CartSyncView,
}

/// Sign in with email and password.
#[instrument(skip(state, session, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = AuthService::new(state.pool())
        .login_with_password(&request.email, &request.password)
        .await?;
    let current_user = CurrentUser::from(&user);

    // New session id on privilege change; the guest cart travels with it.
    session.cycle_id().await?;
    set_current_user(&session, &current_user).await?;

    let status = CartService::new(state.carts(), session, state.config().cart)
        .sign_in(&current_user)
        .await?;

    set_sentry_user(&current_user.id, Some(current_user.email.as_str()));
    tracing::info!(user_id = %current_user.id, ?status, "User signed in");

    Ok(Json(LoginResponse {
        user_id: current_user.id,
        email: current_user.email,
        cart_sync: status.into(),
    }))
}

/// Sign out. The session itself is kept so any unsynced guest cart survives.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    session
        .remove::<bool>(session_keys::CART_SYNC_PENDING)
        .await?;
    session.cycle_id().await?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! cartline user create -e shopper@example.com -p 'correct horse battery'
//! ```

use cartline_storefront::db::create_pool;
use cartline_storefront::services::{AuthError, AuthService};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Account could not be created.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a password account.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `UserError::Auth` if the email is invalid or taken, or the
/// password is too weak.
pub async fn create(email: &str, password: &str) -> Result<i32, UserError> {
    let database_url =
        super::database_url().ok_or(UserError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;

    let user = AuthService::new(&pool)
        .register_with_password(email, password)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User created");
    Ok(user.id.get())
}

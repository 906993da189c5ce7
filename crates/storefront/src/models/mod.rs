//! Domain models for storefront.

pub mod session;
pub mod user;

pub use session::CurrentUser;
pub use session::keys as session_keys;
pub use user::User;

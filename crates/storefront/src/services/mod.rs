//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password sign-in and account creation
//! - `session_cart` - Guest cart stored in the browsing session
//! - `cart` - Active cart resolution, mutations, and sign-in cart sync

pub mod auth;
pub mod cart;
pub mod session_cart;

pub use auth::{AuthError, AuthService};
pub use cart::{ActiveCart, CartService, NewLine, SyncStatus};
pub use session_cart::SessionCartStore;

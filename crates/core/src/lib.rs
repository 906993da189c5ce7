//! Cartline Core - cart domain library.
//!
//! This crate provides the cart model shared by all Cartline components:
//! - `storefront` - Public-facing cart API and sign-in
//! - `cli` - Command-line tools for migrations and account management
//!
//! # Architecture
//!
//! The core crate contains types, the reconciliation algorithm, and the
//! store traits. It performs no I/O; concrete stores live in the storefront.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, emails, cart lines and carts
//! - [`reconcile`] - Merging a guest cart into an account cart
//! - [`store`] - Guest and account cart storage traits, plus an in-memory store
//! - [`sync`] - Sign-in synchronization over the store traits

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod reconcile;
pub mod store;
pub mod sync;
pub mod types;

pub use reconcile::{reconcile, reconcile_at};
pub use store::{AnonymousCartStore, IdentityCartStore, MemoryCartStore, StoreError};
pub use sync::{SyncError, SyncOutcome, synchronize};
pub use types::*;

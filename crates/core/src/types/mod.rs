//! Core types for Cartline.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;

pub use cart::{Cart, CartError, CartLine, CartOwner, LineKey};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};

//! Cartline storefront library.
//!
//! Serves the shopper-facing cart API: guest carts live in the session,
//! account carts in `PostgreSQL`, and signing in merges the first into the
//! second.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

//! Shopfront storefront library.
//!
//! The remote side of cart sync: a JSON API that stores carts per identity
//! and accepts idempotent line writes. Exposed as a library so the router can
//! be tested in-process and served by integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::app;
pub use state::AppState;

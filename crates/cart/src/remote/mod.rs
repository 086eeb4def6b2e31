//! Remote cart store: the backend's source of truth.
//!
//! # Implementations
//!
//! - [`HttpCartClient`] - talks to the storefront cart API over `reqwest`
//! - [`MemoryRemoteStore`] - in-process store with failure injection, for tests
//!
//! Writes are keyed by [`LineKey`] and carry absolute quantities, so every
//! call is safe to repeat: the outbox relies on this when it retries.

mod http;
mod memory;

pub use http::HttpCartClient;
pub use memory::MemoryRemoteStore;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use shopfront_core::{CartIdentity, CartItem, LineKey};

/// Errors that can occur when talking to the remote cart store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The request URL could not be built from the configured base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// The store is not reachable.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// How long the remote store asked callers to wait, if it did.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(secs) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Operations the cart engine needs from the backend.
pub trait RemoteCartStore: Send + Sync + 'static {
    /// Fetch every stored row of the cart keyed by `identity`, oldest first.
    /// Unknown carts are empty.
    ///
    /// Rows come back as stored: two devices adding the same product can leave
    /// two rows that [`CartLines`](shopfront_core::CartLines) would fold into one line.
    fn fetch_cart(
        &self,
        identity: &CartIdentity,
    ) -> impl Future<Output = Result<Vec<CartItem>, RemoteError>> + Send;

    /// Insert or overwrite one line, keyed by its `line_key`.
    ///
    /// Creates the remote cart if this is its first line.
    fn upsert_line(
        &self,
        identity: &CartIdentity,
        line: &CartItem,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Delete one line. Deleting a missing line succeeds.
    fn delete_line(
        &self,
        identity: &CartIdentity,
        line_key: LineKey,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Delete every line of the cart keyed by `identity`.
    fn clear_cart(
        &self,
        identity: &CartIdentity,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

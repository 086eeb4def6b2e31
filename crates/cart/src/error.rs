//! Error types for the cart engine.

use thiserror::Error;

use shopfront_core::CartError;

use crate::config::ConfigError;
use crate::local::LocalStoreError;
use crate::remote::RemoteError;

/// Errors surfaced by [`CartSync`](crate::CartSync) and its callers.
///
/// Remote failures during cart mutations are logged and retried through the
/// outbox; they only reach callers from explicit remote calls.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local persistence failed.
    #[error("Local store error: {0}")]
    Local(#[from] LocalStoreError),

    /// Remote cart API failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Cart operation was rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;

//! Local cart persistence.
//!
//! The local store is the shopper's fast, offline-tolerant copy of the cart.
//! It holds three things:
//!
//! - the anonymous session ID (generated once, recovered on every mount)
//! - one cart snapshot per [`CartIdentity`]
//! - the outbox of remote writes that have not been acknowledged yet
//!
//! Calls are synchronous: every cart mutation is persisted locally before any
//! remote work is attempted.

mod file;
mod memory;

pub use file::FileCartStore;
pub use memory::MemoryCartStore;

use thiserror::Error;

use shopfront_core::{CartIdentity, CartLines, SessionId};

use crate::outbox::CartIntent;

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence for the shopper's side of the cart.
pub trait LocalCartStore: Send + Sync + 'static {
    /// Load the anonymous session ID, if one was generated before.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the stored value cannot be read.
    fn load_session_id(&self) -> Result<Option<SessionId>, LocalStoreError>;

    /// Persist the anonymous session ID.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the value cannot be written.
    fn save_session_id(&self, session_id: SessionId) -> Result<(), LocalStoreError>;

    /// Load the cart snapshot stored for an identity.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the snapshot exists but cannot be read.
    fn load_cart(&self, identity: &CartIdentity) -> Result<Option<CartLines>, LocalStoreError>;

    /// Replace the cart snapshot stored for an identity.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the snapshot cannot be written.
    fn save_cart(&self, identity: &CartIdentity, lines: &CartLines)
    -> Result<(), LocalStoreError>;

    /// Delete the cart snapshot stored for an identity. Missing snapshots are not an error.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the snapshot exists but cannot be removed.
    fn clear_cart(&self, identity: &CartIdentity) -> Result<(), LocalStoreError>;

    /// Load unacknowledged outbox intents in delivery order.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the outbox exists but cannot be read.
    fn load_outbox(&self) -> Result<Vec<CartIntent>, LocalStoreError>;

    /// Replace the persisted outbox.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the outbox cannot be written.
    fn save_outbox(&self, intents: &[CartIntent]) -> Result<(), LocalStoreError>;
}

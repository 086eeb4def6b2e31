//! In-memory local store for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use shopfront_core::{CartIdentity, CartLines, SessionId};

use super::{LocalCartStore, LocalStoreError};
use crate::outbox::CartIntent;

#[derive(Debug, Default)]
struct MemoryState {
    session_id: Option<SessionId>,
    carts: HashMap<String, CartLines>,
    outbox: Vec<CartIntent>,
}

/// Local store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    state: Mutex<MemoryState>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already knows an anonymous session ID.
    #[must_use]
    pub fn with_session(session_id: SessionId) -> Self {
        let store = Self::default();
        store.lock().session_id = Some(session_id);
        store
    }

    /// Whether a snapshot exists for an identity.
    #[must_use]
    pub fn has_cart(&self, identity: &CartIdentity) -> bool {
        self.lock().carts.contains_key(&identity.storage_key())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalCartStore for MemoryCartStore {
    fn load_session_id(&self) -> Result<Option<SessionId>, LocalStoreError> {
        Ok(self.lock().session_id)
    }

    fn save_session_id(&self, session_id: SessionId) -> Result<(), LocalStoreError> {
        self.lock().session_id = Some(session_id);
        Ok(())
    }

    fn load_cart(&self, identity: &CartIdentity) -> Result<Option<CartLines>, LocalStoreError> {
        Ok(self.lock().carts.get(&identity.storage_key()).cloned())
    }

    fn save_cart(
        &self,
        identity: &CartIdentity,
        lines: &CartLines,
    ) -> Result<(), LocalStoreError> {
        self.lock()
            .carts
            .insert(identity.storage_key(), lines.clone());
        Ok(())
    }

    fn clear_cart(&self, identity: &CartIdentity) -> Result<(), LocalStoreError> {
        self.lock().carts.remove(&identity.storage_key());
        Ok(())
    }

    fn load_outbox(&self) -> Result<Vec<CartIntent>, LocalStoreError> {
        Ok(self.lock().outbox.clone())
    }

    fn save_outbox(&self, intents: &[CartIntent]) -> Result<(), LocalStoreError> {
        self.lock().outbox = intents.to_vec();
        Ok(())
    }
}

//! JSON-file backed local store.
//!
//! # Layout
//!
//! ```text
//! <dir>/session.json              anonymous session ID
//! <dir>/outbox.json               pending remote writes
//! <dir>/carts/<identity>.json     one snapshot per identity
//! ```
//!
//! Writes go to a temporary file that is renamed over the target, so a crash
//! mid-write leaves the previous snapshot intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use shopfront_core::{CartIdentity, CartLines, SessionId};

use super::{LocalCartStore, LocalStoreError};
use crate::outbox::CartIntent;

const SESSION_FILE: &str = "session.json";
const OUTBOX_FILE: &str = "outbox.json";
const CARTS_DIR: &str = "carts";

/// Local store that keeps each record in its own JSON file.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    root: PathBuf,
}

impl FileCartStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Io` if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(CARTS_DIR))?;
        debug!(root = %root.display(), "Opened local cart store");
        Ok(Self { root })
    }

    /// Directory this store writes to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cart_path(&self, identity: &CartIdentity) -> PathBuf {
        // ':' is not allowed in file names on every platform
        let file_name = format!("{}.json", identity.storage_key().replace(':', "_"));
        self.root.join(CARTS_DIR).join(file_name)
    }
}

impl LocalCartStore for FileCartStore {
    fn load_session_id(&self) -> Result<Option<SessionId>, LocalStoreError> {
        read_json(&self.root.join(SESSION_FILE))
    }

    fn save_session_id(&self, session_id: SessionId) -> Result<(), LocalStoreError> {
        write_json(&self.root.join(SESSION_FILE), &session_id)
    }

    fn load_cart(&self, identity: &CartIdentity) -> Result<Option<CartLines>, LocalStoreError> {
        read_json(&self.cart_path(identity))
    }

    fn save_cart(
        &self,
        identity: &CartIdentity,
        lines: &CartLines,
    ) -> Result<(), LocalStoreError> {
        write_json(&self.cart_path(identity), lines)
    }

    fn clear_cart(&self, identity: &CartIdentity) -> Result<(), LocalStoreError> {
        match fs::remove_file(self.cart_path(identity)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_outbox(&self) -> Result<Vec<CartIntent>, LocalStoreError> {
        Ok(read_json(&self.root.join(OUTBOX_FILE))?.unwrap_or_default())
    }

    fn save_outbox(&self, intents: &[CartIntent]) -> Result<(), LocalStoreError> {
        write_json(&self.root.join(OUTBOX_FILE), &intents)
    }
}

/// Read a JSON file, treating a missing file as `None`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LocalStoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a JSON file via temp file + rename.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), LocalStoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

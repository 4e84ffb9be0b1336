//! # Minimal single-record persistence.
//!
//! [`RecordStore`] is the get/put contract the agent needs from durable
//! storage: one logical record, whole-record overwrite, no partial updates.
//! The ledger and the schedule store each own one instance.
//!
//! Failures surface as [`StoreError`] internally, but every caller degrades
//! gracefully: a failed read is "no prior state", a failed write is logged
//! and the in-memory value keeps serving.
//!
//! ## Rules
//! - `get` returns `Ok(None)` when the record has never been written.
//! - `put` replaces the whole record. There is no atomic replace; a power
//!   loss mid-write may leave a torn record, which readers treat as absent.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::StoreError;

/// Durable single-record store with whole-record overwrite semantics.
pub trait RecordStore: Send + Sync {
    /// Reads the record. `Ok(None)` if it was never written.
    fn get(&self) -> Result<Option<String>, StoreError>;

    /// Overwrites the record.
    fn put(&self, raw: &str) -> Result<(), StoreError>;
}

/// File-backed store: one record per file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordStore for FileStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, raw: &str) -> Result<(), StoreError> {
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// In-memory store. Useful for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds the record, bypassing `put`.
    pub fn seeded(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }
}

impl RecordStore for MemoryStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot.lock().expect("store poisoned").clone())
    }

    fn put(&self, raw: &str) -> Result<(), StoreError> {
        *self.slot.lock().expect("store poisoned") = Some(raw.to_string());
        Ok(())
    }
}

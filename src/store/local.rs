//! Device-local cart storage.
//!
//! One slot per device holds the anonymous cart as JSON (`{"items": [...]}`).
//! It survives restarts but not a change of device. Loading never fails: a
//! corrupt value is erased and an empty cart takes its place.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::StoreError;
use crate::domain::aggregates::{sanitize_entries, CartSnapshot};

/// A single device-local key-value slot.
pub trait KeyValueSlot: Send + Sync {
    fn get(&self) -> Result<Option<String>, StoreError>;
    fn set(&self, value: &str) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

/// Slot backed by a file on disk.
#[derive(Clone, Debug)]
pub struct FileSlot { path: PathBuf }

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl KeyValueSlot for FileSlot {
    fn get(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, value: &str) -> Result<(), StoreError> {
        // write-then-rename so a crash never leaves half a cart behind
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process slot. Clones share the same value.
#[derive(Clone, Debug, Default)]
pub struct MemorySlot { value: Arc<Mutex<Option<String>>> }

impl MemorySlot {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self { value: Arc::new(Mutex::new(Some(value.into()))) }
    }

    pub fn peek(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl KeyValueSlot for MemorySlot {
    fn get(&self) -> Result<Option<String>, StoreError> { Ok(self.peek()) }

    fn set(&self, value: &str) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// What [`LocalCartStore::load`] found.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalLoad {
    pub snapshot: CartSnapshot,
    /// Entries that failed validation or repeated a product id.
    pub dropped: usize,
    /// Valid entries cut beyond the line-item cap.
    pub truncated: usize,
    /// The stored value was unreadable and has been erased.
    pub recovered: bool,
}

pub struct LocalCartStore { slot: Box<dyn KeyValueSlot> }

impl std::fmt::Debug for LocalCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartStore").finish_non_exhaustive()
    }
}

impl LocalCartStore {
    pub fn new(slot: impl KeyValueSlot + 'static) -> Self { Self { slot: Box::new(slot) } }

    pub fn load(&self) -> LocalLoad {
        let raw = match self.slot.get() {
            Ok(Some(raw)) => raw,
            Ok(None) => return LocalLoad::default(),
            // not UTF-8
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(error = %e, "local cart corrupt, erasing");
                return self.erase_corrupt();
            }
            Err(e) => {
                warn!(error = %e, "local cart unreadable, starting empty");
                return LocalLoad::default();
            }
        };

        let entries = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(mut map)) => match map.remove("items") {
                Some(serde_json::Value::Array(entries)) => Some(entries),
                _ => None,
            },
            _ => None,
        };

        let Some(entries) = entries else {
            warn!(bytes = raw.len(), "local cart corrupt, erasing");
            return self.erase_corrupt();
        };

        let sanitized = sanitize_entries(entries);
        if sanitized.dropped > 0 || sanitized.truncated > 0 {
            warn!(dropped = sanitized.dropped, truncated = sanitized.truncated, "local cart entries discarded on load");
        }
        LocalLoad {
            snapshot: CartSnapshot { items: sanitized.items },
            dropped: sanitized.dropped,
            truncated: sanitized.truncated,
            recovered: false,
        }
    }

    fn erase_corrupt(&self) -> LocalLoad {
        if let Err(e) = self.slot.remove() {
            warn!(error = %e, "failed to erase corrupt local cart");
        }
        LocalLoad { recovered: true, ..LocalLoad::default() }
    }

    pub fn save(&self, snapshot: &CartSnapshot) -> Result<(), StoreError> {
        let raw = serde_json::to_string(snapshot)?;
        self.slot.set(&raw)?;
        debug!(items = snapshot.items.len(), "local cart saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.slot.remove()?;
        debug!("local cart erased");
        Ok(())
    }
}

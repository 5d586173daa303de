use std::sync::{Arc, Mutex};

use super::{decode, encode, Persistence, PersistenceError};
use crate::models::Notification;

/// In-process storage holding the serialized collection.
///
/// Clones share the same slot, so a second service built from a clone
/// sees what the first one saved (a page reload, in dashboard terms).
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-serialized document (possibly malformed).
    pub fn with_contents(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// The raw stored document, if any.
    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError> {
        let slot = self.slot.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        match slot.as_deref() {
            Some(raw) => decode(raw),
            None => Ok(None),
        }
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        let raw = encode(notifications)?;
        let mut slot = self.slot.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        *slot = Some(raw);
        Ok(())
    }
}

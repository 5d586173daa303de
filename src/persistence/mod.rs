//! Storage adapters for the notification collection.
//!
//! The service never talks to a storage medium directly; it goes through
//! [`Persistence`], which loads and saves the whole collection as one JSON
//! array. Three adapters ship with the crate:
//! - [`MemoryPersistence`]: a shared in-process string, for tests and
//!   memory-only sessions
//! - [`JsonFilePersistence`]: one JSON file, replaced atomically on save
//! - [`SqlitePersistence`]: one row of a local key-value table

mod json_file;
mod memory;
mod sqlite;

pub use json_file::JsonFilePersistence;
pub use memory::MemoryPersistence;
pub use sqlite::SqlitePersistence;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Notification;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Stored notifications are corrupt: {0}")]
    Corrupt(String),

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Load/save the full notification collection.
pub trait Persistence: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError>;

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError>;
}

impl<P: Persistence + ?Sized> Persistence for Box<P> {
    fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        (**self).save(notifications)
    }
}

/// What the service does when storage cannot be read or written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageFailurePolicy {
    /// Log and keep going from memory. Unreadable data starts an empty
    /// collection; a failed save still commits the change in memory.
    #[default]
    FallbackToMemory,
    /// Return the error. Unreadable data fails construction; a failed save
    /// leaves the collection as it was.
    Surface,
}

/// Decode a stored JSON document. Blank input counts as "nothing stored".
pub(crate) fn decode(raw: &str) -> Result<Option<Vec<Notification>>, PersistenceError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| PersistenceError::Corrupt(e.to_string()))
}

pub(crate) fn encode(notifications: &[Notification]) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(notifications)?)
}

use std::io::Write;
use std::path::{Path, PathBuf};

use super::{decode, encode, Persistence, PersistenceError};
use crate::models::Notification;

/// Collection stored as a single JSON array file.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-write leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        decode(&raw)
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        let raw = encode(notifications)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut staging = tempfile::NamedTempFile::new_in(&dir)?;
        staging.write_all(raw.as_bytes())?;
        staging.as_file().sync_all()?;
        staging
            .persist(&self.path)
            .map_err(|e| PersistenceError::Io(e.error))?;
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::{
    JsonFilePersistence, MemoryPersistence, Persistence, PersistenceError, SqlitePersistence,
    StorageFailurePolicy,
};

/// Application-level constants
pub const APP_NAME: &str = "ClinicNotify";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage key the collection is kept under (key-value backends).
pub const DEFAULT_STORAGE_KEY: &str = "clinic_notifications";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,clinic_notify=debug"
}

/// Get the application data directory.
/// Platform data dir (e.g. ~/.local/share/ClinicNotify); falls back to the
/// working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the JSON file backend.
pub fn notifications_file() -> PathBuf {
    app_data_dir().join("notifications.json")
}

/// Default location of the SQLite backend.
pub fn notifications_db() -> PathBuf {
    app_data_dir().join("notifications.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the collection is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackend {
    /// Nothing survives the process.
    Memory,
    JsonFile { path: PathBuf },
    Sqlite { path: PathBuf },
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::JsonFile {
            path: notifications_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub backend: StorageBackend,
    pub storage_key: String,
    pub failure_policy: StorageFailurePolicy,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            failure_policy: StorageFailurePolicy::default(),
        }
    }
}

impl NotificationConfig {
    /// Memory-only configuration (tests, previews).
    pub fn in_memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded notification config");
        Ok(config)
    }

    /// Build the persistence adapter this configuration names.
    pub fn open_persistence(&self) -> Result<Box<dyn Persistence>, PersistenceError> {
        Ok(match &self.backend {
            StorageBackend::Memory => Box::new(MemoryPersistence::new()),
            StorageBackend::JsonFile { path } => Box::new(JsonFilePersistence::new(path)),
            StorageBackend::Sqlite { path } => {
                Box::new(SqlitePersistence::open(path, self.storage_key.clone())?)
            }
        })
    }
}

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{decode, encode, Persistence, PersistenceError};
use crate::models::Notification;

/// Collection stored under one key of a SQLite key-value table.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
    key: String,
}

impl SqlitePersistence {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: &Path, key: impl Into<String>) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, key)
    }

    /// In-memory database (for testing).
    pub fn open_in_memory(key: impl Into<String>) -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?, key)
    }

    fn from_connection(conn: Connection, key: impl Into<String>) -> Result<Self, PersistenceError> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Persistence for SqlitePersistence {
    fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError> {
        let conn = self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        match get_value(&conn, &self.key)? {
            Some(raw) => decode(&raw),
            None => Ok(None),
        }
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        let raw = encode(notifications)?;
        let conn = self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        set_value(&conn, &self.key, &raw)
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), PersistenceError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
fn run_migrations(conn: &Connection) -> Result<(), PersistenceError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_key_value_store.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| PersistenceError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT value FROM key_value_store WHERE key = ?1")?;
    match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(PersistenceError::from(e)),
    }
}

fn set_value(conn: &Connection, key: &str, value: &str) -> Result<(), PersistenceError> {
    conn.execute(
        "INSERT INTO key_value_store (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationType, Priority, UserRole};

    fn notification(id: &str) -> Notification {
        Notification {
            id: id.into(),
            notification_type: NotificationType::TestResult,
            title: "Test Results Available".into(),
            message: "Your test results are ready to view.".into(),
            user_id: "patient7".into(),
            user_role: UserRole::Client,
            appointment_id: None,
            is_read: true,
            created_at: chrono::Utc::now(),
            priority: Priority::Medium,
            action_url: None,
        }
    }

    #[test]
    fn schema_version_is_current() {
        let store = SqlitePersistence::open_in_memory("notifications").unwrap();
        let conn = store.conn.lock().unwrap();
        assert_eq!(get_current_version(&conn), 1);
    }

    #[test]
    fn migration_idempotent() {
        let store = SqlitePersistence::open_in_memory("notifications").unwrap();
        let conn = store.conn.lock().unwrap();
        assert!(run_migrations(&conn).is_ok());
    }

    #[test]
    fn missing_key_loads_none() {
        let store = SqlitePersistence::open_in_memory("notifications").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_upserts_single_row() {
        let store = SqlitePersistence::open_in_memory("notifications").unwrap();
        store.save(&[notification("1")]).unwrap();
        store.save(&[notification("2"), notification("1")]).unwrap();

        let rows: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM key_value_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "2");
        assert!(loaded[1].is_read);
    }

    #[test]
    fn keys_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("clinic.db");
        let a = SqlitePersistence::open(&path, "notifications:a").unwrap();
        a.save(&[notification("1")]).unwrap();
        let b = SqlitePersistence::open(&path, "notifications:b").unwrap();
        assert!(b.load().unwrap().is_none());
        assert_eq!(b.key(), "notifications:b");
    }

    #[test]
    fn reopen_file_keeps_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("clinic.db");
        {
            let store = SqlitePersistence::open(&path, "notifications").unwrap();
            store.save(&[notification("7")]).unwrap();
        }
        let store = SqlitePersistence::open(&path, "notifications").unwrap();
        assert_eq!(store.load().unwrap().unwrap()[0].id, "7");
    }

    #[test]
    fn corrupt_value_is_reported() {
        let store = SqlitePersistence::open_in_memory("notifications").unwrap();
        {
            let conn = store.conn.lock().unwrap();
            set_value(&conn, "notifications", "{{{").unwrap();
        }
        assert!(matches!(store.load(), Err(PersistenceError::Corrupt(_))));
    }
}

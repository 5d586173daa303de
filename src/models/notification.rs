use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::enums::{NotificationType, Priority, UserRole};

/// Length of the random part of a generated id.
const ID_SUFFIX_LEN: usize = 9;

/// Composite ownership key: a notification belongs to exactly one
/// (user, role) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    pub user_id: String,
    pub role: UserRole,
}

impl Owner {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.user_id)
    }
}

/// A single notification as stored and broadcast.
///
/// Field names follow the persisted JSON layout (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub user_id: String,
    pub user_role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<u64>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl Notification {
    pub fn owner(&self) -> Owner {
        Owner::new(self.user_id.clone(), self.user_role)
    }

    pub fn is_owned_by(&self, user_id: &str, role: UserRole) -> bool {
        self.user_id == user_id && self.user_role == role
    }

    /// Flip to read. Returns true if the state changed.
    pub fn mark_read(&mut self) -> bool {
        let changed = !self.is_read;
        self.is_read = true;
        changed
    }
}

/// Generate a notification id: creation time in milliseconds followed by a
/// random lowercase alphanumeric suffix. Collisions are unlikely, not impossible.
pub fn generate_notification_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}", now.timestamp_millis(), suffix)
}

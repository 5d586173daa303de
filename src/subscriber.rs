//! Change listeners.
//!
//! A subscriber receives the complete collection after every mutation and
//! once on registration. Per-owner filtering happens on the subscriber side;
//! [`OwnerFilter`] packages the common case.

use tokio::sync::mpsc;

use crate::models::{Notification, UserRole};

pub trait Subscriber: Send + Sync {
    fn on_change(&self, notifications: &[Notification]);
}

impl<F> Subscriber for F
where
    F: Fn(&[Notification]) + Send + Sync,
{
    fn on_change(&self, notifications: &[Notification]) {
        self(notifications)
    }
}

// ═══════════════════════════════════════════════════════════
// OwnerFilter
// ═══════════════════════════════════════════════════════════

/// Forwards only the records owned by one (user, role) pair.
pub struct OwnerFilter<S> {
    user_id: String,
    role: UserRole,
    inner: S,
}

impl<S: Subscriber> OwnerFilter<S> {
    pub fn new(user_id: impl Into<String>, role: UserRole, inner: S) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            inner,
        }
    }
}

impl<S: Subscriber> Subscriber for OwnerFilter<S> {
    fn on_change(&self, notifications: &[Notification]) {
        let owned: Vec<Notification> = notifications
            .iter()
            .filter(|n| n.is_owned_by(&self.user_id, self.role))
            .cloned()
            .collect();
        self.inner.on_change(&owned);
    }
}

// ═══════════════════════════════════════════════════════════
// ChannelSubscriber
// ═══════════════════════════════════════════════════════════

/// Pushes owned snapshots into a bounded tokio channel.
///
/// Never blocks the mutating caller: when the channel is full or the
/// receiver is gone the snapshot is dropped.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Vec<Notification>>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::Sender<Vec<Notification>>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<Notification>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn on_change(&self, notifications: &[Notification]) {
        match self.tx.try_send(notifications.to_vec()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Subscriber channel full, snapshot dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Subscriber channel closed, snapshot dropped");
            }
        }
    }
}

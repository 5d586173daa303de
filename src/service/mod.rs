//! The notification registry.
//!
//! `NotificationService` owns the ordered collection (newest first), writes
//! it through a [`Persistence`] adapter after every change and pushes the
//! full collection to every subscriber. It is an ordinary value: build one
//! per session and hand it to whoever needs it (wrap in `Arc` to share).
//!
//! Mutations follow one path (`commit`): apply to a copy, save the copy,
//! swap it in, release the lock, broadcast. Subscribers therefore never run
//! under an internal lock and may call back into the service.

mod helpers;

pub use helpers::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::NotificationConfig;
use crate::models::{generate_notification_id, Notification, UserRole};
use crate::persistence::{Persistence, PersistenceError, StorageFailurePolicy};
use crate::subscriber::{ChannelSubscriber, Subscriber};
use crate::templates::{find_template, TemplateVars};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification template not found: {0}")]
    TemplateNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

// ═══════════════════════════════════════════════════════════
// Creation request
// ═══════════════════════════════════════════════════════════

/// Everything needed to create one notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub template_key: String,
    pub user_id: String,
    pub user_role: UserRole,
    pub appointment_id: Option<u64>,
    pub action_url: Option<String>,
    pub vars: TemplateVars,
}

impl NewNotification {
    pub fn new(template_key: impl Into<String>, user_id: impl Into<String>, user_role: UserRole) -> Self {
        Self {
            template_key: template_key.into(),
            user_id: user_id.into(),
            user_role,
            appointment_id: None,
            action_url: None,
            vars: TemplateVars::new(),
        }
    }

    pub fn appointment(mut self, appointment_id: Option<u64>) -> Self {
        self.appointment_id = appointment_id;
        self
    }

    pub fn action_url(mut self, url: Option<String>) -> Self {
        self.action_url = url;
        self
    }

    pub fn vars(mut self, vars: TemplateVars) -> Self {
        self.vars = vars;
        self
    }
}

// ═══════════════════════════════════════════════════════════
// Subscriber registry
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
struct SubscriberRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Arc<dyn Subscriber>)>>,
}

impl SubscriberRegistry {
    fn add(&self, subscriber: Arc<dyn Subscriber>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by `subscribe`. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) removes the subscriber.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<SubscriberRegistry>,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the subscriber registered for the lifetime of the service.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            tracing::debug!(subscription = self.id, "Subscriber removed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

// ═══════════════════════════════════════════════════════════
// NotificationService
// ═══════════════════════════════════════════════════════════

pub struct NotificationService {
    /// Newest first.
    notifications: RwLock<Vec<Notification>>,
    persistence: Box<dyn Persistence>,
    subscribers: Arc<SubscriberRegistry>,
    policy: StorageFailurePolicy,
}

impl NotificationService {
    /// Build a service and load whatever the adapter has stored.
    pub fn new(
        persistence: impl Persistence + 'static,
        policy: StorageFailurePolicy,
    ) -> Result<Self, NotificationError> {
        let notifications = match persistence.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => Vec::new(),
            Err(e) => match policy {
                StorageFailurePolicy::Surface => return Err(e.into()),
                StorageFailurePolicy::FallbackToMemory => {
                    tracing::warn!(error = %e, "Stored notifications unreadable, starting empty");
                    Vec::new()
                }
            },
        };
        tracing::info!(count = notifications.len(), "Notification service opened");

        Ok(Self {
            notifications: RwLock::new(notifications),
            persistence: Box::new(persistence),
            subscribers: Arc::new(SubscriberRegistry::default()),
            policy,
        })
    }

    /// Build a service from configuration.
    pub fn open(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let persistence = config.open_persistence()?;
        Self::new(persistence, config.failure_policy)
    }

    pub fn policy(&self) -> StorageFailurePolicy {
        self.policy
    }

    // ── Creation ────────────────────────────────────────────

    /// Create a notification from a registered template and prepend it.
    pub fn create_notification(
        &self,
        template_key: &str,
        user_id: &str,
        user_role: UserRole,
        appointment_id: Option<u64>,
        action_url: Option<&str>,
    ) -> Result<Notification, NotificationError> {
        self.create_notification_with(
            NewNotification::new(template_key, user_id, user_role)
                .appointment(appointment_id)
                .action_url(action_url.map(str::to_string)),
        )
    }

    /// Create a notification, interpolating `request.vars` into the message.
    pub fn create_notification_with(
        &self,
        request: NewNotification,
    ) -> Result<Notification, NotificationError> {
        let template = find_template(&request.template_key)
            .ok_or_else(|| NotificationError::TemplateNotFound(request.template_key.clone()))?;

        let now = Utc::now();
        let notification = Notification {
            id: generate_notification_id(now),
            notification_type: template.notification_type,
            title: template.title.to_string(),
            message: template.render_message(&request.vars),
            user_id: request.user_id,
            user_role: request.user_role,
            appointment_id: request.appointment_id,
            is_read: false,
            created_at: now,
            priority: template.priority,
            action_url: request.action_url,
        };

        let created = notification.clone();
        self.commit("create", move |all| {
            all.insert(0, notification);
            Some(())
        })?;
        tracing::debug!(
            id = %created.id,
            template = template.key,
            owner = %created.owner(),
            "Notification created"
        );
        Ok(created)
    }

    // ── Queries ─────────────────────────────────────────────

    /// All notifications owned by (user_id, user_role), newest first.
    pub fn get_notifications(&self, user_id: &str, user_role: UserRole) -> Vec<Notification> {
        self.read()
            .iter()
            .filter(|n| n.is_owned_by(user_id, user_role))
            .cloned()
            .collect()
    }

    pub fn get_notification(&self, id: &str) -> Option<Notification> {
        self.read().iter().find(|n| n.id == id).cloned()
    }

    pub fn get_unread_count(&self, user_id: &str, user_role: UserRole) -> usize {
        self.read()
            .iter()
            .filter(|n| n.is_owned_by(user_id, user_role) && !n.is_read)
            .count()
    }

    /// The full collection, every owner included.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // ── Mutations ───────────────────────────────────────────

    /// Mark one notification read. An unknown id is a silent no-op. A
    /// known id always persists and broadcasts, even if already read.
    /// Returns true only when the read state actually flipped.
    pub fn mark_as_read(&self, id: &str) -> Result<bool, NotificationError> {
        let changed = self.commit("mark_as_read", |all| {
            all.iter_mut().find(|n| n.id == id).map(Notification::mark_read)
        })?;
        Ok(changed.unwrap_or(false))
    }

    /// Mark every notification of one owner read. Always persists and
    /// broadcasts. Returns how many changed.
    pub fn mark_all_as_read(
        &self,
        user_id: &str,
        user_role: UserRole,
    ) -> Result<usize, NotificationError> {
        let changed = self.commit("mark_all_as_read", |all| {
            let count = all
                .iter_mut()
                .filter(|n| n.is_owned_by(user_id, user_role))
                .map(Notification::mark_read)
                .filter(|changed| *changed)
                .count();
            Some(count)
        })?;
        Ok(changed.unwrap_or(0))
    }

    /// Remove one notification. Returns false when the id is unknown.
    pub fn delete_notification(&self, id: &str) -> Result<bool, NotificationError> {
        let removed = self.commit("delete_notification", |all| {
            let pos = all.iter().position(|n| n.id == id)?;
            Some(all.remove(pos))
        })?;
        Ok(removed.is_some())
    }

    /// Remove every notification of one owner. Always persists and
    /// broadcasts. Returns how many were removed.
    pub fn clear_notifications(
        &self,
        user_id: &str,
        user_role: UserRole,
    ) -> Result<usize, NotificationError> {
        let removed = self.commit("clear_notifications", |all| {
            let before = all.len();
            all.retain(|n| !n.is_owned_by(user_id, user_role));
            Some(before - all.len())
        })?;
        Ok(removed.unwrap_or(0))
    }

    // ── Subscriptions ───────────────────────────────────────

    /// Register a subscriber and immediately replay the current collection
    /// to it.
    pub fn subscribe<S: Subscriber + 'static>(&self, subscriber: S) -> Subscription {
        let subscriber: Arc<dyn Subscriber> = Arc::new(subscriber);
        let id = self.subscribers.add(Arc::clone(&subscriber));
        tracing::debug!(subscription = id, "Subscriber added");

        let current = self.snapshot();
        subscriber.on_change(&current);

        Subscription {
            id,
            registry: Arc::downgrade(&self.subscribers),
            active: true,
        }
    }

    /// Subscribe through a bounded channel of collection snapshots.
    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> (Subscription, mpsc::Receiver<Vec<Notification>>) {
        let (subscriber, rx) = ChannelSubscriber::channel(capacity);
        (self.subscribe(subscriber), rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    // ── Internals ───────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, Vec<Notification>> {
        self.notifications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Notification>> {
        self.notifications
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the collection. `None` from `change`
    /// means the target id does not exist: no write, no broadcast.
    fn commit<R>(
        &self,
        op: &'static str,
        change: impl FnOnce(&mut Vec<Notification>) -> Option<R>,
    ) -> Result<Option<R>, NotificationError> {
        let (result, current) = {
            let mut guard = self.write();
            let mut next = guard.clone();
            let Some(result) = change(&mut next) else {
                return Ok(None);
            };

            if let Err(e) = self.persistence.save(&next) {
                match self.policy {
                    StorageFailurePolicy::Surface => {
                        tracing::warn!(op, error = %e, "Save failed, change discarded");
                        return Err(e.into());
                    }
                    StorageFailurePolicy::FallbackToMemory => {
                        tracing::warn!(op, error = %e, "Save failed, keeping change in memory only");
                    }
                }
            }

            *guard = next;
            (result, guard.clone())
        };

        self.broadcast(&current);
        Ok(Some(result))
    }

    fn broadcast(&self, current: &[Notification]) {
        for subscriber in self.subscribers.snapshot() {
            subscriber.on_change(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationType, Priority};
    use crate::persistence::MemoryPersistence;
    use crate::subscriber::OwnerFilter;

    fn service() -> NotificationService {
        NotificationService::new(MemoryPersistence::new(), StorageFailurePolicy::default()).unwrap()
    }

    /// Adapter whose saves always fail.
    struct BrokenStorage;

    impl Persistence for BrokenStorage {
        fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError> {
            Ok(None)
        }

        fn save(&self, _: &[Notification]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "quota exceeded",
            )))
        }
    }

    /// Adapter that counts saves and otherwise stores nothing.
    #[derive(Default)]
    struct CountingStorage {
        saves: Arc<AtomicU64>,
    }

    impl Persistence for CountingStorage {
        fn load(&self) -> Result<Option<Vec<Notification>>, PersistenceError> {
            Ok(None)
        }

        fn save(&self, _: &[Notification]) -> Result<(), PersistenceError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl Fn(&[Notification]) + Send + Sync) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |ns: &[Notification]| sink.lock().unwrap().push(ns.len()))
    }

    #[test]
    fn create_builds_record_from_template() {
        let svc = service();
        let n = svc
            .create_notification("appointment_confirmed", "user1", UserRole::Client, Some(42), None)
            .unwrap();
        assert_eq!(n.notification_type, NotificationType::Appointment);
        assert_eq!(n.title, "Appointment Confirmed");
        assert_eq!(n.priority, Priority::Medium);
        assert_eq!(n.appointment_id, Some(42));
        assert!(!n.is_read);
        assert_eq!(svc.get_notification(&n.id), Some(n));
    }

    #[test]
    fn unknown_template_fails_and_leaves_collection_unchanged() {
        let svc = service();
        svc.create_notification("system_update", "u", UserRole::Client, None, None)
            .unwrap();
        let err = svc
            .create_notification("not_a_real_key", "u", UserRole::Client, None, None)
            .unwrap_err();
        assert!(matches!(err, NotificationError::TemplateNotFound(ref k) if k == "not_a_real_key"));
        assert_eq!(svc.len(), 1);
    }

    #[test]
    fn newest_first() {
        let svc = service();
        let first = svc
            .create_notification("system_update", "u", UserRole::Staff, None, None)
            .unwrap();
        let second = svc
            .create_notification("system_maintenance", "u", UserRole::Staff, None, None)
            .unwrap();
        let list = svc.get_notifications("u", UserRole::Staff);
        assert_eq!(list[0].id, second.id);
        assert_eq!(list[1].id, first.id);
    }

    #[test]
    fn queries_filter_by_owner_pair() {
        let svc = service();
        svc.create_notification("system_update", "u1", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "u1", UserRole::Staff, None, None).unwrap();
        svc.create_notification("system_update", "u2", UserRole::Client, None, None).unwrap();

        let list = svc.get_notifications("u1", UserRole::Client);
        assert_eq!(list.len(), 1);
        assert!(list.iter().all(|n| n.is_owned_by("u1", UserRole::Client)));
        assert!(svc.get_notifications("nobody", UserRole::Admin).is_empty());
    }

    #[test]
    fn unread_count_tracks_reads() {
        let svc = service();
        let a = svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(svc.get_unread_count("u", UserRole::Client), 2);

        assert!(svc.mark_as_read(&a.id).unwrap());
        assert_eq!(svc.get_unread_count("u", UserRole::Client), 1);
    }

    #[test]
    fn mark_as_read_twice_is_harmless() {
        let svc = service();
        let n = svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert!(svc.mark_as_read(&n.id).unwrap());
        assert!(!svc.mark_as_read(&n.id).unwrap());
        assert!(svc.get_notification(&n.id).unwrap().is_read);
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let svc = service();
        assert!(!svc.mark_as_read("missing").unwrap());
        assert!(!svc.delete_notification("missing").unwrap());
    }

    #[test]
    fn mark_all_only_touches_owner() {
        let svc = service();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "v", UserRole::Client, None, None).unwrap();

        assert_eq!(svc.mark_all_as_read("u", UserRole::Client).unwrap(), 2);
        assert_eq!(svc.get_unread_count("u", UserRole::Client), 0);
        assert_eq!(svc.get_unread_count("v", UserRole::Client), 1);
        assert_eq!(svc.mark_all_as_read("u", UserRole::Client).unwrap(), 0);
    }

    #[test]
    fn delete_removes_one() {
        let svc = service();
        let a = svc.create_notification("system_update", "u", UserRole::Admin, None, None).unwrap();
        let b = svc.create_notification("system_update", "u", UserRole::Admin, None, None).unwrap();
        assert!(svc.delete_notification(&a.id).unwrap());
        let ids: Vec<_> = svc.snapshot().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[test]
    fn clear_removes_only_owner() {
        let svc = service();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "u", UserRole::Staff, None, None).unwrap();

        assert_eq!(svc.clear_notifications("u", UserRole::Client).unwrap(), 2);
        assert!(svc.get_notifications("u", UserRole::Client).is_empty());
        assert_eq!(svc.get_notifications("u", UserRole::Staff).len(), 1);
    }

    #[test]
    fn subscribe_replays_then_receives_updates() {
        let svc = service();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();

        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn subscribers_get_the_unfiltered_collection() {
        let svc = service();
        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);
        svc.create_notification("system_update", "a", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "b", UserRole::Admin, None, None).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unknown_ids_do_not_broadcast() {
        let svc = service();
        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);
        svc.mark_as_read("missing").unwrap();
        svc.delete_notification("missing").unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn matched_mutations_broadcast_even_without_change() {
        let svc = service();
        let n = svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.mark_as_read(&n.id).unwrap();

        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);
        assert!(!svc.mark_as_read(&n.id).unwrap());
        assert_eq!(svc.mark_all_as_read("u", UserRole::Client).unwrap(), 0);
        assert_eq!(svc.mark_all_as_read("nobody", UserRole::Admin).unwrap(), 0);
        assert_eq!(svc.clear_notifications("nobody", UserRole::Admin).unwrap(), 0);

        assert_eq!(*calls.lock().unwrap(), vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn one_save_per_mutation() {
        let store = CountingStorage::default();
        let saves = store.saves.clone();
        let svc = NotificationService::new(store, StorageFailurePolicy::Surface).unwrap();
        let save_count = || saves.load(Ordering::SeqCst);
        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);

        let a = svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(save_count(), 1);
        let b = svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(save_count(), 2);

        let err = svc
            .create_notification("not_a_real_key", "u", UserRole::Client, None, None)
            .unwrap_err();
        assert!(matches!(err, NotificationError::TemplateNotFound(_)));
        assert_eq!(save_count(), 2);

        svc.mark_as_read(&a.id).unwrap();
        assert_eq!(save_count(), 3);
        svc.mark_as_read(&a.id).unwrap();
        assert_eq!(save_count(), 4);
        svc.mark_all_as_read("u", UserRole::Client).unwrap();
        assert_eq!(save_count(), 5);
        svc.delete_notification(&b.id).unwrap();
        assert_eq!(save_count(), 6);
        svc.clear_notifications("u", UserRole::Client).unwrap();
        assert_eq!(save_count(), 7);

        svc.mark_as_read("missing").unwrap();
        svc.delete_notification("missing").unwrap();
        assert_eq!(save_count(), 7);
        assert!(svc.is_empty());
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2, 2, 2, 2, 1, 0]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let svc = service();
        let (calls, listener) = recorder();
        let sub = svc.subscribe(listener);
        assert_eq!(svc.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(svc.subscriber_count(), 0);
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let svc = service();
        {
            let (_calls, listener) = recorder();
            let _sub = svc.subscribe(listener);
            assert_eq!(svc.subscriber_count(), 1);
        }
        assert_eq!(svc.subscriber_count(), 0);
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let svc = service();
        let (calls, listener) = recorder();
        svc.subscribe(listener).detach();
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(svc.subscriber_count(), 1);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn subscriber_may_query_the_service() {
        let svc = Arc::new(service());
        let counts = Arc::new(Mutex::new(Vec::new()));
        let (svc_ref, sink) = (Arc::downgrade(&svc), counts.clone());
        let _sub = svc.subscribe(move |_: &[Notification]| {
            if let Some(svc) = svc_ref.upgrade() {
                sink.lock().unwrap().push(svc.get_unread_count("u", UserRole::Client));
            }
        });
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(*counts.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn owner_filter_subscription() {
        let svc = service();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = svc.subscribe(OwnerFilter::new("u", UserRole::Client, move |ns: &[Notification]| {
            sink.lock().unwrap().push(ns.len());
        }));
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        svc.create_notification("system_update", "u", UserRole::Staff, None, None).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 1]);
    }

    #[test]
    fn channel_subscription_receives_snapshots() {
        let svc = service();
        let (_sub, mut rx) = svc.subscribe_channel(8);
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(rx.try_recv().unwrap().len(), 0);
        assert_eq!(rx.try_recv().unwrap().len(), 1);
    }

    #[test]
    fn reload_restores_collection() {
        let store = MemoryPersistence::new();
        let svc = NotificationService::new(store.clone(), StorageFailurePolicy::Surface).unwrap();
        let n = svc.create_notification("billing_overdue", "u", UserRole::Client, None, None).unwrap();
        svc.mark_as_read(&n.id).unwrap();

        let reloaded = NotificationService::new(store, StorageFailurePolicy::Surface).unwrap();
        assert_eq!(reloaded.snapshot(), svc.snapshot());
    }

    #[test]
    fn corrupt_storage_falls_back_to_empty() {
        let store = MemoryPersistence::with_contents("[{broken");
        let svc = NotificationService::new(store, StorageFailurePolicy::FallbackToMemory).unwrap();
        assert!(svc.is_empty());
    }

    #[test]
    fn corrupt_storage_surfaces_when_configured() {
        let store = MemoryPersistence::with_contents("[{broken");
        let result = NotificationService::new(store, StorageFailurePolicy::Surface);
        assert!(matches!(
            result,
            Err(NotificationError::Persistence(PersistenceError::Corrupt(_)))
        ));
    }

    #[test]
    fn failed_save_keeps_change_in_memory_by_default() {
        let svc = NotificationService::new(BrokenStorage, StorageFailurePolicy::FallbackToMemory).unwrap();
        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);
        svc.create_notification("system_update", "u", UserRole::Client, None, None).unwrap();
        assert_eq!(svc.len(), 1);
        assert_eq!(*calls.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn failed_save_discards_change_when_surfaced() {
        let svc = NotificationService::new(BrokenStorage, StorageFailurePolicy::Surface).unwrap();
        let (calls, listener) = recorder();
        let _sub = svc.subscribe(listener);
        let err = svc
            .create_notification("system_update", "u", UserRole::Client, None, None)
            .unwrap_err();
        assert!(matches!(err, NotificationError::Persistence(_)));
        assert!(svc.is_empty());
        assert_eq!(*calls.lock().unwrap(), vec![0]);
    }
}

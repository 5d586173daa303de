pub mod config;
pub mod models;
pub mod persistence;
pub mod service;
pub mod subscriber;
pub mod templates;

pub use config::NotificationConfig;
pub use models::{Notification, NotificationType, Owner, Priority, UserRole};
pub use persistence::{Persistence, PersistenceError, StorageFailurePolicy};
pub use service::{NewNotification, NotificationError, NotificationService, Subscription};
pub use subscriber::{ChannelSubscriber, OwnerFilter, Subscriber};
pub use templates::{
    AppointmentEvent, BillingEvent, ReminderEvent, SystemEvent, TemplateVars, TestResultEvent,
};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Honors `RUST_LOG`, otherwise
/// uses [`config::default_log_filter`]. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
}

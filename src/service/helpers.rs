//! Typed creation helpers used by the dashboards.
//!
//! Each helper maps a semantic event to its template key, fills in the
//! interpolation values it knows about and links the notification to the
//! owner's dashboard section.

use chrono::NaiveDate;

use super::{NewNotification, NotificationError, NotificationService};
use crate::models::{Notification, UserRole};
use crate::templates::{
    AppointmentEvent, BillingEvent, ReminderEvent, SystemEvent, TemplateVars, TestResultEvent,
};

/// Dashboard route for a role's section, e.g. `/client/billing`.
pub fn dashboard_url(role: UserRole, section: &str) -> String {
    format!("/{}/{}", role.as_str(), section)
}

impl NotificationService {
    pub fn create_appointment_notification(
        &self,
        event: AppointmentEvent,
        user_id: &str,
        user_role: UserRole,
        appointment_id: Option<u64>,
        date: Option<NaiveDate>,
    ) -> Result<Notification, NotificationError> {
        let vars = match date {
            Some(d) => TemplateVars::new().date(d),
            None => TemplateVars::new(),
        };
        self.create_notification_with(
            NewNotification::new(event.template_key(), user_id, user_role)
                .appointment(appointment_id)
                .action_url(Some(dashboard_url(user_role, "appointments")))
                .vars(vars),
        )
    }

    pub fn create_test_result_notification(
        &self,
        event: TestResultEvent,
        user_id: &str,
        user_role: UserRole,
        test_name: Option<&str>,
    ) -> Result<Notification, NotificationError> {
        let vars = match test_name {
            Some(name) => TemplateVars::new().test(name),
            None => TemplateVars::new(),
        };
        self.create_notification_with(
            NewNotification::new(event.template_key(), user_id, user_role)
                .action_url(Some(dashboard_url(user_role, "test-results")))
                .vars(vars),
        )
    }

    pub fn create_billing_notification(
        &self,
        event: BillingEvent,
        user_id: &str,
        user_role: UserRole,
        amount: Option<f64>,
    ) -> Result<Notification, NotificationError> {
        let vars = match amount {
            Some(a) => TemplateVars::new().amount(a),
            None => TemplateVars::new(),
        };
        self.create_notification_with(
            NewNotification::new(event.template_key(), user_id, user_role)
                .action_url(Some(dashboard_url(user_role, "billing")))
                .vars(vars),
        )
    }

    pub fn create_system_notification(
        &self,
        event: SystemEvent,
        user_id: &str,
        user_role: UserRole,
    ) -> Result<Notification, NotificationError> {
        self.create_notification_with(NewNotification::new(event.template_key(), user_id, user_role))
    }

    pub fn create_reminder_notification(
        &self,
        event: ReminderEvent,
        user_id: &str,
        user_role: UserRole,
        appointment_id: Option<u64>,
    ) -> Result<Notification, NotificationError> {
        self.create_notification_with(
            NewNotification::new(event.template_key(), user_id, user_role)
                .appointment(appointment_id),
        )
    }
}

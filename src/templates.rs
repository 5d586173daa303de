//! Notification templates and the typed events that select them.
//!
//! Every notification starts from a template in [`TEMPLATES`]. A template
//! fixes the type, priority and title; the message is either the generic
//! `message` or, when the caller supplies every placeholder it names, the
//! richer `detail` text with the values substituted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::enums::str_enum;
use crate::models::{NotificationType, Priority};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

// ═══════════════════════════════════════════════════════════
// Template table
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTemplate {
    pub key: &'static str,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub title: &'static str,
    pub message: &'static str,
    /// Message used when every `{placeholder}` it names has a value.
    pub detail: Option<&'static str>,
}

macro_rules! template {
    ($key:literal, $ty:ident, $prio:ident, $title:literal, $msg:literal) => {
        NotificationTemplate {
            key: $key,
            notification_type: NotificationType::$ty,
            priority: Priority::$prio,
            title: $title,
            message: $msg,
            detail: None,
        }
    };
    ($key:literal, $ty:ident, $prio:ident, $title:literal, $msg:literal, $detail:literal) => {
        NotificationTemplate {
            key: $key,
            notification_type: NotificationType::$ty,
            priority: Priority::$prio,
            title: $title,
            message: $msg,
            detail: Some($detail),
        }
    };
}

pub static TEMPLATES: &[NotificationTemplate] = &[
    // Appointments
    template!(
        "appointment_confirmed", Appointment, Medium,
        "Appointment Confirmed",
        "Your appointment has been confirmed.",
        "Your appointment on {date} has been confirmed."
    ),
    template!(
        "appointment_cancelled", Appointment, High,
        "Appointment Cancelled",
        "Your appointment has been cancelled. Please contact the clinic to reschedule.",
        "Your appointment on {date} has been cancelled. Please contact the clinic to reschedule."
    ),
    template!(
        "appointment_rescheduled", Appointment, Medium,
        "Appointment Rescheduled",
        "Your appointment has been rescheduled.",
        "Your appointment has been rescheduled to {date}."
    ),
    template!(
        "appointment_reminder", Reminder, Medium,
        "Upcoming Appointment",
        "You have an upcoming appointment.",
        "Reminder: you have an appointment on {date}."
    ),
    template!(
        "appointment_completed", Appointment, Low,
        "Appointment Completed",
        "Your appointment is complete. Visit notes will be available shortly."
    ),
    // Test results
    template!(
        "test_result_ready", TestResult, Medium,
        "Test Results Available",
        "Your test results are ready to view.",
        "Your {test} results are ready to view."
    ),
    template!(
        "test_result_abnormal", TestResult, High,
        "Abnormal Test Result",
        "One of your test results is outside the normal range. Your provider will follow up.",
        "Your {test} result is outside the normal range. Your provider will follow up."
    ),
    template!(
        "test_result_critical", TestResult, Urgent,
        "Critical Test Result",
        "A test result requires immediate attention. Please contact the clinic now.",
        "Your {test} result requires immediate attention. Please contact the clinic now."
    ),
    // Billing
    template!(
        "billing_payment_due", Billing, Medium,
        "Payment Due",
        "You have a payment due.",
        "You have a payment of {amount} due."
    ),
    template!(
        "billing_payment_received", Billing, Low,
        "Payment Received",
        "Thank you, your payment has been received.",
        "Thank you, your payment of {amount} has been received."
    ),
    template!(
        "billing_overdue", Billing, High,
        "Payment Overdue",
        "You have an overdue balance. Please pay as soon as possible.",
        "Your balance of {amount} is overdue. Please pay as soon as possible."
    ),
    template!(
        "billing_insurance_processed", Billing, Low,
        "Insurance Claim Processed",
        "Your insurance claim has been processed.",
        "Your insurance claim has been processed. Remaining balance: {amount}."
    ),
    // System
    template!(
        "system_maintenance", System, Low,
        "Scheduled Maintenance",
        "The patient portal will be briefly unavailable during scheduled maintenance."
    ),
    template!(
        "system_update", System, Low,
        "System Update",
        "New features are available in your dashboard."
    ),
    template!(
        "system_security", System, Urgent,
        "Security Alert",
        "Unusual activity was detected on your account. Please review your recent sign-ins."
    ),
    // Reminders
    template!(
        "reminder_medication", Reminder, Medium,
        "Medication Reminder",
        "It is time to take your medication."
    ),
    template!(
        "reminder_follow_up", Reminder, Medium,
        "Follow-up Needed",
        "Please schedule your follow-up visit."
    ),
    template!(
        "reminder_annual_checkup", Reminder, Low,
        "Annual Check-up",
        "You are due for your annual check-up."
    ),
];

/// Look up a template by key.
pub fn find_template(key: &str) -> Option<&'static NotificationTemplate> {
    TEMPLATES.iter().find(|t| t.key == key)
}

// ═══════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════

/// Values substituted into `{placeholder}`s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars(BTreeMap<&'static str, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    pub fn date(self, date: NaiveDate) -> Self {
        self.with("date", format_date(date))
    }

    /// Non-finite amounts are skipped so the generic message is used.
    pub fn amount(self, amount: f64) -> Self {
        if !amount.is_finite() {
            return self;
        }
        self.with("amount", format_amount(amount))
    }

    pub fn test(self, test_name: impl Into<String>) -> Self {
        self.with("test", test_name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl NotificationTemplate {
    /// Resolve the message text for the given variables.
    pub fn render_message(&self, vars: &TemplateVars) -> String {
        match self.detail {
            Some(detail) if placeholders_satisfied(detail, vars) => {
                PLACEHOLDER
                    .replace_all(detail, |caps: &regex::Captures<'_>| {
                        vars.get(&caps[1]).unwrap_or_default().to_string()
                    })
                    .into_owned()
            }
            _ => self.message.to_string(),
        }
    }
}

fn placeholders_satisfied(text: &str, vars: &TemplateVars) -> bool {
    PLACEHOLDER
        .captures_iter(text)
        .all(|caps| vars.get(&caps[1]).is_some())
}

/// "March 5, 2026"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// "$150.00", "-$20.00"
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round();
    let sign = if cents < 0.0 { "-" } else { "" };
    format!("{sign}${:.2}", cents.abs() / 100.0)
}

// ═══════════════════════════════════════════════════════════
// Typed events
// ═══════════════════════════════════════════════════════════

str_enum!(AppointmentEvent {
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Rescheduled => "rescheduled",
    Reminder => "reminder",
    Completed => "completed",
});

str_enum!(TestResultEvent {
    Ready => "ready",
    Abnormal => "abnormal",
    Critical => "critical",
});

str_enum!(BillingEvent {
    PaymentDue => "payment_due",
    PaymentReceived => "payment_received",
    Overdue => "overdue",
    InsuranceProcessed => "insurance_processed",
});

str_enum!(SystemEvent {
    Maintenance => "maintenance",
    Update => "update",
    Security => "security",
});

str_enum!(ReminderEvent {
    Medication => "medication",
    FollowUp => "follow_up",
    AnnualCheckup => "annual_checkup",
});

impl AppointmentEvent {
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::Confirmed => "appointment_confirmed",
            Self::Cancelled => "appointment_cancelled",
            Self::Rescheduled => "appointment_rescheduled",
            Self::Reminder => "appointment_reminder",
            Self::Completed => "appointment_completed",
        }
    }
}

impl TestResultEvent {
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::Ready => "test_result_ready",
            Self::Abnormal => "test_result_abnormal",
            Self::Critical => "test_result_critical",
        }
    }
}

impl BillingEvent {
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::PaymentDue => "billing_payment_due",
            Self::PaymentReceived => "billing_payment_received",
            Self::Overdue => "billing_overdue",
            Self::InsuranceProcessed => "billing_insurance_processed",
        }
    }
}

impl SystemEvent {
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::Maintenance => "system_maintenance",
            Self::Update => "system_update",
            Self::Security => "system_security",
        }
    }
}

impl ReminderEvent {
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::Medication => "reminder_medication",
            Self::FollowUp => "reminder_follow_up",
            Self::AnnualCheckup => "reminder_annual_checkup",
        }
    }
}
